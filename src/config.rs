// filemesh - Peer-to-peer file sharing network with a central directory
// Copyright (C) 2026  filemesh contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Start-up configuration: a JSON document loaded once and exposed both as
//! typed structs (for the fields the core actually reads) and as a
//! dotted-path accessor (`Config::get`) for anything a collaborator
//! (file generator, evaluation harness, CLI) might reach for instead.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::FileMeshResult;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,

    pub peer: PeerConfig,

    pub replication: ReplicationConfig,

    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// The full parsed document, retained for `get()` lookups into fields
    /// (`data.file_generation.*`, collaborator-only `logging.*` knobs) that
    /// this struct doesn't model explicitly.
    #[serde(skip)]
    raw: Value,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PeerConfig {
    pub host: String,
    pub base_port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReplicationConfig {
    pub replication_factor: u32,

    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
}

fn default_max_tasks() -> usize {
    5
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct DataConfig {
    #[serde(default)]
    pub peers: HashMap<String, PeerDirs>,

    /// Test-dataset parameters. Opaque to the core beyond `chunk_size_bytes`
    /// (see `Config::chunk_size_bytes`) — the generator itself is a
    /// collaborator, out of scope here.
    #[serde(default)]
    pub file_generation: Value,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PeerDirs {
    pub shared_dir: String,
    pub download_dir: String,
    pub replicated_dir: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> FileMeshResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> FileMeshResult<Self> {
        let raw: Value = serde_json::from_slice(bytes)?;
        let mut config: Config = serde_json::from_value(raw.clone())?;
        config.raw = raw;
        Ok(config)
    }

    /// Access a nested config value via dot notation, e.g. `get("server.port")`.
    pub fn get(&self, key_path: &str) -> Option<&Value> {
        if key_path.is_empty() {
            return None;
        }
        let mut node = &self.raw;
        for key in key_path.split('.') {
            node = node.as_object()?.get(key)?;
        }
        Some(node)
    }

    pub fn peer_dirs(&self, peer_id: &str) -> Option<&PeerDirs> {
        self.data.peers.get(peer_id)
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        self.get("data.file_generation.chunk_size_bytes")
            .and_then(Value::as_u64)
            .unwrap_or(1024 * 1024)
    }
}
