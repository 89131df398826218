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

//! Applies `REGISTRY_REQUEST` mutations to the file index and returns a
//! `REGISTRY_RESPONSE` carrying whatever replication work the registering
//! peer should perform.

use std::net::SocketAddr;

use serde_json::{Map, Value};

use crate::index::{FileIndex, PeerRecord};
use crate::protocol::{Envelope, REGISTRY_RESPONSE};
use crate::replication::ReplicationPlanner;

pub struct RegistryHandler<'a> {
    index: &'a FileIndex,
    replication_factor: u32,
    max_tasks: usize,
}

impl<'a> RegistryHandler<'a> {
    pub fn new(index: &'a FileIndex, replication_factor: u32, max_tasks: usize) -> Self {
        Self {
            index,
            replication_factor,
            max_tasks,
        }
    }

    pub fn handle(&self, envelope: &Envelope, remote_addr: SocketAddr) -> Envelope {
        let peer_id = match envelope.peer_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => {
                return error_response(None, "missing peer_id");
            }
        };

        let peer_obj = envelope.payload.get("peer").and_then(Value::as_object);

        let declared_host = peer_obj.and_then(|o| o.get("host")).and_then(Value::as_str);
        let declared_port = peer_obj.and_then(|o| o.get("port")).and_then(Value::as_u64);

        let host = declared_host
            .map(str::to_string)
            .unwrap_or_else(|| remote_addr.ip().to_string());
        let port = declared_port
            .map(|p| p as u16)
            .unwrap_or_else(|| remote_addr.port());

        let mut attributes = peer_obj.cloned().unwrap_or_default();
        attributes.remove("host");
        attributes.remove("port");
        attributes.remove("peer_id");

        self.index.add_peer(PeerRecord {
            peer_id: peer_id.to_string(),
            host,
            port,
            attributes,
        });

        let files = envelope
            .payload
            .get("files")
            .cloned()
            .unwrap_or(Value::Null);
        let mut registered = 0usize;
        for (file_name, meta) in normalize_files(&files) {
            self.index.add_file(peer_id, &file_name, meta);
            registered += 1;
        }

        let planner = ReplicationPlanner::new(self.index, self.replication_factor);
        let tasks = planner.build_tasks_for(peer_id, self.max_tasks);

        let mut payload = serde_json::json!({
            "status": "ok",
            "registered_files": registered,
            "replication_required": !tasks.is_empty(),
        });
        if !tasks.is_empty() {
            payload["replication_tasks"] =
                serde_json::to_value(&tasks).unwrap_or(Value::Array(Vec::new()));
        }

        Envelope::new(REGISTRY_RESPONSE, payload, Some(peer_id.to_string()))
    }
}

/// Normalize the registry's polymorphic `files` field — either a mapping
/// `{name -> meta}` or a list of `{name|file_name, ...meta}` — into a flat
/// `[(name, meta)]`. Any other shape (missing, scalar, etc.) normalizes to
/// no entries rather than erroring; the caller just registers zero files.
fn normalize_files(files: &Value) -> Vec<(String, Value)> {
    match files {
        Value::Object(map) => map
            .iter()
            .map(|(name, meta)| (name.clone(), meta.clone()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let name = obj
                    .get("name")
                    .or_else(|| obj.get("file_name"))
                    .and_then(Value::as_str)?
                    .to_string();
                let mut meta = obj.clone();
                meta.remove("name");
                meta.remove("file_name");
                Some((name, Value::Object(meta)))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn error_response(peer_id: Option<String>, error: &str) -> Envelope {
    Envelope::new(
        REGISTRY_RESPONSE,
        serde_json::json!({ "status": "error", "error": error }),
        peer_id,
    )
}

pub fn unknown_message_type(message_type: &str) -> Envelope {
    error_response(None, &format!("unknown message type: {message_type}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::REGISTRY_REQUEST;

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[test]
    fn missing_peer_id_is_rejected() {
        let idx = FileIndex::new();
        let handler = RegistryHandler::new(&idx, 2, 5);
        let req = Envelope::new(REGISTRY_REQUEST, serde_json::json!({}), None);
        let resp = handler.handle(&req, addr());
        assert_eq!(resp.payload["status"], "error");
    }

    #[test]
    fn registers_declared_host_and_port_over_socket_address() {
        let idx = FileIndex::new();
        let handler = RegistryHandler::new(&idx, 2, 5);
        let req = Envelope::new(
            REGISTRY_REQUEST,
            serde_json::json!({
                "files": {"a.txt": {}},
                "peer": {"host": "10.0.0.5", "port": 7100}
            }),
            Some("peer1".to_string()),
        );
        let resp = handler.handle(&req, addr());
        assert_eq!(resp.payload["status"], "ok");
        assert_eq!(resp.payload["registered_files"], 1);
        let record = idx.peer("peer1").unwrap();
        assert_eq!(record.host, "10.0.0.5");
        assert_eq!(record.port, 7100);
    }

    #[test]
    fn falls_back_to_socket_address_when_peer_undeclared() {
        let idx = FileIndex::new();
        let handler = RegistryHandler::new(&idx, 2, 5);
        let req = Envelope::new(REGISTRY_REQUEST, serde_json::json!({}), Some("peer1".to_string()));
        handler.handle(&req, addr());
        let record = idx.peer("peer1").unwrap();
        assert_eq!(record.host, "127.0.0.1");
        assert_eq!(record.port, 9999);
    }

    #[test]
    fn empty_shared_directory_registers_zero_files_no_tasks() {
        let idx = FileIndex::new();
        let handler = RegistryHandler::new(&idx, 2, 5);
        let req = Envelope::new(REGISTRY_REQUEST, serde_json::json!({}), Some("peer1".to_string()));
        let resp = handler.handle(&req, addr());
        assert_eq!(resp.payload["registered_files"], 0);
        assert_eq!(resp.payload["replication_required"], false);
        assert!(resp.payload.get("replication_tasks").is_none());
    }

    #[test]
    fn accepts_list_shaped_files_payload() {
        let idx = FileIndex::new();
        let handler = RegistryHandler::new(&idx, 2, 5);
        let req = Envelope::new(
            REGISTRY_REQUEST,
            serde_json::json!({"files": [{"file_name": "a.txt", "size_bytes": 10}]}),
            Some("peer1".to_string()),
        );
        let resp = handler.handle(&req, addr());
        assert_eq!(resp.payload["registered_files"], 1);
        assert_eq!(idx.peers_for_file("a.txt").len(), 1);
    }
}
