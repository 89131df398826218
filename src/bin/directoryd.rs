//! Directory server binary: loads config, binds the registry/search
//! listener, and runs the accept loop until killed.

#[macro_use]
extern crate log;

use std::env::var;
use std::path::PathBuf;
use std::process;

use filemesh::config::Config;
use filemesh::directory_server::DirectoryServer;

#[tokio::main]
async fn main() {
    let config_loc = var("FILEMESH_CONFIG").unwrap_or_else(|_| "config.json".into());

    let config = match Config::load(&PathBuf::from(&config_loc)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config from '{config_loc}': {e}");
            process::exit(1);
        }
    };

    init_logger(config.logging.level.as_deref());

    let server = match DirectoryServer::bind(
        &config.server.host,
        config.server.port,
        config.replication.replication_factor,
        config.replication.max_tasks,
    )
    .await
    {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind directory server: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        error!("directory server exited: {e}");
        process::exit(1);
    }
}

/// Picks an `env_logger` filter level from `logging.level` when present,
/// otherwise falls back to `env_logger`'s own `RUST_LOG`-based default.
fn init_logger(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if let Some(level) = level {
        match level.parse() {
            Ok(filter) => {
                builder.filter_level(filter);
            }
            Err(_) => eprintln!("ignoring unrecognized logging.level '{level}'"),
        }
    }
    builder.init();
}
