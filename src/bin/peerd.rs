//! Peer binary: registers with the directory, serves its shared files to
//! other peers, and exposes a minimal stdin command loop (`lookup`,
//! `download`, `list`, `stats`, `exit`) over the core peer APIs.

#[macro_use]
extern crate log;

use std::env::{args, var};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use filemesh::config::Config;
use filemesh::file_store::FileStore;
use filemesh::metrics::MetricsCollector;
use filemesh::peer_client::{compute_port, PeerClient};
use filemesh::transfer_server::TransferServer;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config_loc = var("FILEMESH_CONFIG").unwrap_or_else(|_| "config.json".into());
    let peer_id = var("FILEMESH_PEER_ID")
        .ok()
        .or_else(|| args().nth(1))
        .unwrap_or_else(|| {
            eprintln!("usage: peerd <peer_id> (or set FILEMESH_PEER_ID)");
            process::exit(1);
        });

    let config = match Config::load(&PathBuf::from(&config_loc)) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config from '{config_loc}': {e}");
            process::exit(1);
        }
    };

    let dirs = match config.peer_dirs(&peer_id) {
        Some(dirs) => dirs.clone(),
        None => {
            error!("no data.peers.{peer_id} entry in config");
            process::exit(1);
        }
    };

    let store = Arc::new(FileStore::new(
        dirs.shared_dir,
        dirs.download_dir,
        dirs.replicated_dir,
    ));
    let metrics = Arc::new(MetricsCollector::new());
    let chunk_size = config.chunk_size_bytes();
    let port = compute_port(&peer_id, config.peer.base_port);

    let transfer_store = (*store).clone();
    let transfer = match TransferServer::bind(&config.peer.host, port, &peer_id, transfer_store, chunk_size).await {
        Ok(server) => server,
        Err(e) => {
            error!("failed to bind transfer server: {e}");
            process::exit(1);
        }
    };
    tokio::spawn(transfer.run());

    let client = PeerClient::new(
        peer_id.clone(),
        config.server.host.clone(),
        config.server.port,
        config.peer.host.clone(),
        port,
        store.clone(),
        metrics.clone(),
        chunk_size,
    );

    match client.register().await {
        Ok(resp) => info!("registered with directory: {:?}", resp.payload),
        Err(e) => warn!("registration failed: {e}"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("filemesh peer '{peer_id}' ready. commands: lookup <file> | download <file> | list local|downloaded|replicated | stats | exit");

    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("lookup") => {
                let Some(file_name) = parts.next() else {
                    println!("usage: lookup <file>");
                    continue;
                };
                match client.search(file_name).await {
                    Ok(resp) => println!("{}", resp.payload),
                    Err(e) => println!("lookup failed: {e}"),
                }
            }
            Some("download") => {
                let Some(file_name) = parts.next() else {
                    println!("usage: download <file>");
                    continue;
                };
                match client.search(file_name).await {
                    Ok(resp) => {
                        let first = resp
                            .payload
                            .get("results")
                            .and_then(|r| r.as_array())
                            .and_then(|arr| arr.first());
                        match first {
                            Some(result) => {
                                let host = result["peer"]["host"].as_str().unwrap_or_default();
                                let port = result["peer"]["port"].as_u64().unwrap_or(0) as u16;
                                match client.obtain(host, port, file_name).await {
                                    Ok(path) => println!("saved to {}", path.display()),
                                    Err(e) => println!("download failed: {e}"),
                                }
                            }
                            None => println!("no peer serves '{file_name}'"),
                        }
                    }
                    Err(e) => println!("lookup failed: {e}"),
                }
            }
            Some("list") => match parts.next() {
                Some("local") => print_listing(store.list_shared_files().await),
                Some("downloaded") => print_listing(store.list_downloaded_files().await),
                Some("replicated") => print_listing(store.list_replicated_files().await),
                _ => println!("usage: list local|downloaded|replicated"),
            },
            Some("stats") => {
                let stats = metrics.statistics();
                println!(
                    "search_times: {:?}\ndownload_speeds: {:?}\nthroughput_bytes_per_sec: {:?}",
                    stats.search_times, stats.download_speeds, stats.throughput_bytes_per_sec
                );
            }
            Some("exit") => break,
            Some(other) => println!("unknown command '{other}'"),
            None => {}
        }
    }
}

fn print_listing(result: filemesh::error::FileMeshResult<std::collections::HashMap<String, u64>>) {
    match result {
        Ok(files) => {
            for (name, size) in files {
                println!("{name}\t{size}");
            }
        }
        Err(e) => println!("list failed: {e}"),
    }
}
