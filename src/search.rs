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

//! Resolves `SEARCH_REQUEST` against the file index. No ranking, no
//! partial-match, no globbing — an exact `file_name` lookup.

use serde_json::Value;

use crate::index::FileIndex;
use crate::protocol::{Envelope, SEARCH_RESPONSE};

pub struct SearchHandler<'a> {
    index: &'a FileIndex,
}

impl<'a> SearchHandler<'a> {
    pub fn new(index: &'a FileIndex) -> Self {
        Self { index }
    }

    pub fn handle(&self, envelope: &Envelope) -> Envelope {
        let query = envelope.payload.get("query");
        let file_name = match query {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Object(obj)) => obj
                .get("file_name")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };

        let payload = match file_name {
            None => serde_json::json!({
                "status": "error",
                "error": "missing file_name",
                "results": [],
            }),
            Some(file_name) => {
                let results = self.index.peers_for_file(&file_name);
                serde_json::json!({
                    "status": "ok",
                    "file_name": file_name,
                    "results": results,
                })
            }
        };

        Envelope::new(SEARCH_RESPONSE, payload, envelope.peer_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PeerRecord;
    use crate::protocol::SEARCH_REQUEST;
    use serde_json::Map;

    #[test]
    fn missing_file_name_is_an_error() {
        let idx = FileIndex::new();
        let handler = SearchHandler::new(&idx);
        let req = Envelope::new(SEARCH_REQUEST, serde_json::json!({}), None);
        let resp = handler.handle(&req);
        assert_eq!(resp.payload["status"], "error");
    }

    #[test]
    fn missing_file_yields_ok_with_empty_results() {
        let idx = FileIndex::new();
        let handler = SearchHandler::new(&idx);
        let req = Envelope::new(
            SEARCH_REQUEST,
            serde_json::json!({"query": "nope.bin"}),
            None,
        );
        let resp = handler.handle(&req);
        assert_eq!(resp.payload["status"], "ok");
        assert!(resp.payload["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn string_query_resolves_as_file_name() {
        let idx = FileIndex::new();
        idx.add_peer(PeerRecord {
            peer_id: "peer1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 7100,
            attributes: Map::new(),
        });
        idx.add_file("peer1", "a.txt", serde_json::Value::Null);

        let handler = SearchHandler::new(&idx);
        let req = Envelope::new(SEARCH_REQUEST, serde_json::json!({"query": "a.txt"}), None);
        let resp = handler.handle(&req);
        let results = resp.payload["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["peer_id"], "peer1");
        assert_eq!(results[0]["peer"]["host"], "127.0.0.1");
        assert_eq!(results[0]["peer"]["port"], 7100);
    }

    #[test]
    fn object_query_resolves_via_file_name_key() {
        let idx = FileIndex::new();
        let handler = SearchHandler::new(&idx);
        let req = Envelope::new(
            SEARCH_REQUEST,
            serde_json::json!({"query": {"file_name": "b.bin"}}),
            None,
        );
        let resp = handler.handle(&req);
        assert_eq!(resp.payload["status"], "ok");
        assert_eq!(resp.payload["file_name"], "b.bin");
    }
}
