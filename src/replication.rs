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

//! Server-driven replication policy: on each registration, compute up to
//! `max_tasks` file-copy tasks that push the registering peer toward the
//! configured replication factor. Stateless and greedy — no global plan is
//! persisted, each registration just makes locally greedy progress.

use serde::Serialize;

use crate::index::FileIndex;

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationSource {
    pub peer_id: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationTask {
    pub file_name: String,
    pub source: ReplicationSource,
}

pub struct ReplicationPlanner<'a> {
    index: &'a FileIndex,
    replication_factor: u32,
}

impl<'a> ReplicationPlanner<'a> {
    pub fn new(index: &'a FileIndex, replication_factor: u32) -> Self {
        Self {
            index,
            replication_factor: replication_factor.max(1),
        }
    }

    /// True iff the file already meets the configured replication factor.
    pub fn check_replication(&self, file_name: &str) -> bool {
        self.index.peers_for_file(file_name).len() as u32 >= self.replication_factor
    }

    /// The first `count` registry peers that are neither already serving
    /// `file_name` nor present in `exclude`. Iteration order is stable
    /// within a single scan (registry insertion order via the underlying
    /// map is not guaranteed across calls, only within one).
    pub fn select_targets(
        &self,
        file_name: &str,
        count: usize,
        exclude: &[String],
    ) -> Vec<crate::index::PeerRecord> {
        let serving: std::collections::HashSet<String> = self
            .index
            .peers_for_file(file_name)
            .into_iter()
            .map(|s| s.peer_id)
            .chain(exclude.iter().cloned())
            .collect();

        self.index
            .all_peers()
            .into_iter()
            .filter(|p| !serving.contains(&p.peer_id))
            .take(count)
            .collect()
    }

    /// Build up to `max_tasks` replication tasks for `target_peer_id`,
    /// scanning every known file for under-replication.
    pub fn build_tasks_for(&self, target_peer_id: &str, max_tasks: usize) -> Vec<ReplicationTask> {
        let mut tasks = Vec::new();

        for file_name in self.index.list_files() {
            if tasks.len() >= max_tasks {
                break;
            }

            let servings = self.index.peers_for_file(&file_name);
            if servings.len() as u32 >= self.replication_factor {
                continue;
            }
            if servings.iter().any(|s| s.peer_id == target_peer_id) {
                continue;
            }
            let Some(source) = servings.first() else {
                continue;
            };
            if source.peer.host.is_empty() || source.peer.port == 0 {
                continue;
            }

            tasks.push(ReplicationTask {
                file_name,
                source: ReplicationSource {
                    peer_id: source.peer.peer_id.clone(),
                    host: source.peer.host.clone(),
                    port: source.peer.port,
                },
            });
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PeerRecord;
    use serde_json::{Map, Value};

    fn record(peer_id: &str, port: u16) -> PeerRecord {
        PeerRecord {
            peer_id: peer_id.to_string(),
            host: "127.0.0.1".to_string(),
            port,
            attributes: Map::new(),
        }
    }

    #[test]
    fn empty_index_produces_no_tasks() {
        let idx = FileIndex::new();
        let planner = ReplicationPlanner::new(&idx, 2);
        assert!(planner.build_tasks_for("peer1", 5).is_empty());
    }

    #[test]
    fn factor_one_needs_no_replication_once_served() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        idx.add_file("peer1", "f.bin", Value::Null);
        let planner = ReplicationPlanner::new(&idx, 1);
        assert!(planner.check_replication("f.bin"));
        assert!(planner.build_tasks_for("peer2", 5).is_empty());
    }

    #[test]
    fn under_replicated_file_produces_one_task_pointing_at_first_source() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        idx.add_file("peer1", "f.bin", Value::Null);
        let planner = ReplicationPlanner::new(&idx, 2);
        let tasks = planner.build_tasks_for("peer2", 5);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].file_name, "f.bin");
        assert_eq!(tasks[0].source.peer_id, "peer1");
        assert_eq!(tasks[0].source.port, 7100);
    }

    #[test]
    fn target_already_serving_file_is_skipped() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        idx.add_peer(record("peer2", 7101));
        idx.add_file("peer1", "f.bin", Value::Null);
        idx.add_file("peer2", "f.bin", Value::Null);
        let planner = ReplicationPlanner::new(&idx, 2);
        assert!(planner.build_tasks_for("peer2", 5).is_empty());
    }

    #[test]
    fn task_disjointness_target_never_already_serving() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        idx.add_file("peer1", "f.bin", Value::Null);
        let planner = ReplicationPlanner::new(&idx, 2);
        let tasks = planner.build_tasks_for("peer3", 5);
        for t in &tasks {
            let serving = idx.peers_for_file(&t.file_name);
            assert!(!serving.iter().any(|s| s.peer_id == "peer3"));
        }
    }

    #[test]
    fn max_tasks_bounds_output() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        for i in 0..10 {
            idx.add_file("peer1", &format!("f{i}.bin"), Value::Null);
        }
        let planner = ReplicationPlanner::new(&idx, 2);
        assert_eq!(planner.build_tasks_for("peer2", 3).len(), 3);
    }

    #[test]
    fn select_targets_excludes_servers_and_exclusions() {
        let idx = FileIndex::new();
        idx.add_peer(record("peer1", 7100));
        idx.add_peer(record("peer2", 7101));
        idx.add_peer(record("peer3", 7102));
        idx.add_file("peer1", "f.bin", Value::Null);
        let planner = ReplicationPlanner::new(&idx, 3);
        let targets = planner.select_targets("f.bin", 5, &["peer2".to_string()]);
        let ids: Vec<_> = targets.iter().map(|p| p.peer_id.clone()).collect();
        assert!(!ids.contains(&"peer1".to_string()));
        assert!(!ids.contains(&"peer2".to_string()));
        assert!(ids.contains(&"peer3".to_string()));
    }
}
