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

//! The directory's authoritative, in-memory index of `file_name -> [peer]`
//! and `peer_id -> peer_record`. A single `RwLock` guards both maps so that
//! `remove_peer` can delete the registry entry and sweep every serving list
//! in one atomic step (spec invariant I3) — operations never yield while
//! the lock is held, matching the CPU-only suspension-point rule.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::{Map, Value};

/// A registered peer's network identity and free-form attributes.
#[derive(Debug, Clone, Serialize)]
pub struct PeerRecord {
    pub peer_id: String,
    pub host: String,
    pub port: u16,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct Serving {
    peer_id: String,
    meta: Value,
}

/// A single peer's file entry as returned by `peers_for_file`, enriched
/// with the current registry record for that peer.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedServing {
    pub peer_id: String,
    pub peer: PeerRecord,
    pub meta: Value,
}

#[derive(Default)]
struct Inner {
    files: HashMap<String, Vec<Serving>>,
    peers: HashMap<String, PeerRecord>,
}

pub struct FileIndex {
    inner: RwLock<Inner>,
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FileIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Insert or replace-by-id a peer's registry record. Does not touch
    /// any files previously registered by this peer — a fresh
    /// registration augments the peer's file set rather than resetting it.
    pub fn add_peer(&self, record: PeerRecord) {
        let mut inner = self.inner.write().expect("file index lock poisoned");
        inner.peers.insert(record.peer_id.clone(), record);
    }

    /// Atomically delete the registry entry and sweep every serving list.
    /// No file is ever observed with a stale `peer_id` between those two
    /// actions — both happen under the same write guard.
    pub fn remove_peer(&self, peer_id: &str) {
        let mut inner = self.inner.write().expect("file index lock poisoned");
        inner.peers.remove(peer_id);
        inner.files.retain(|_, servings| {
            servings.retain(|s| s.peer_id != peer_id);
            !servings.is_empty()
        });
    }

    pub fn peer(&self, peer_id: &str) -> Option<PeerRecord> {
        let inner = self.inner.read().expect("file index lock poisoned");
        inner.peers.get(peer_id).cloned()
    }

    /// Idempotent: a second `add_file` for the same `(peer_id, file_name)`
    /// is a no-op — the first-written `meta` is preserved, not overwritten.
    pub fn add_file(&self, peer_id: &str, file_name: &str, meta: Value) {
        let mut inner = self.inner.write().expect("file index lock poisoned");
        let servings = inner.files.entry(file_name.to_string()).or_default();
        if !servings.iter().any(|s| s.peer_id == peer_id) {
            servings.push(Serving {
                peer_id: peer_id.to_string(),
                meta,
            });
        }
    }

    /// Remove a single peer's serving of a file. Drops the file entry
    /// entirely once its last serving is gone (invariant I4).
    pub fn remove_file(&self, peer_id: &str, file_name: &str) {
        let mut inner = self.inner.write().expect("file index lock poisoned");
        if let Some(servings) = inner.files.get_mut(file_name) {
            servings.retain(|s| s.peer_id != peer_id);
            if servings.is_empty() {
                inner.files.remove(file_name);
            }
        }
    }

    /// Enriched servings for a file. A serving whose peer_id is not (or
    /// no longer) present in the registry is silently omitted — readers
    /// must never observe a broken reference.
    pub fn peers_for_file(&self, file_name: &str) -> Vec<EnrichedServing> {
        let inner = self.inner.read().expect("file index lock poisoned");
        let Some(servings) = inner.files.get(file_name) else {
            return Vec::new();
        };
        servings
            .iter()
            .filter_map(|s| {
                let peer = inner.peers.get(&s.peer_id)?;
                Some(EnrichedServing {
                    peer_id: s.peer_id.clone(),
                    peer: peer.clone(),
                    meta: s.meta.clone(),
                })
            })
            .collect()
    }

    pub fn list_files(&self) -> Vec<String> {
        let inner = self.inner.read().expect("file index lock poisoned");
        inner.files.keys().cloned().collect()
    }

    /// Raw per-peer view used by the replication planner to enumerate
    /// registry candidates without forcing a round trip through
    /// `peers_for_file` for every file.
    pub fn all_peers(&self) -> Vec<PeerRecord> {
        let inner = self.inner.read().expect("file index lock poisoned");
        inner.peers.values().cloned().collect()
    }
}
