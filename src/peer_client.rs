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

//! The peer side of every wire conversation: register with the directory,
//! search it, and obtain/replicate files from other peers. One TCP
//! connection per request — no connection pooling, no keep-alive,
//! matching the directory and transfer servers' one-shot framing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{FileMeshError, FileMeshResult};
use crate::file_store::FileStore;
use crate::metrics::MetricsCollector;
use crate::protocol::{
    self, make_obtain_request, make_registry_request, make_replicate_request, make_search_request,
    Envelope, OBTAIN_RESPONSE, REPLICATE_RESPONSE,
};

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// `peerN` binds `base_port + max(N - 1, 0)`; a non-numeric suffix falls
/// back to `base_port` unchanged.
pub fn compute_port(peer_id: &str, base_port: u16) -> u16 {
    let digits: String = peer_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    match digits.parse::<i64>() {
        Ok(n) => {
            let offset = (n - 1).max(0);
            base_port.saturating_add(offset as u16)
        }
        Err(_) => base_port,
    }
}

pub struct PeerClient {
    peer_id: String,
    directory_host: String,
    directory_port: u16,
    advertised_host: String,
    advertised_port: u16,
    store: Arc<FileStore>,
    metrics: Arc<MetricsCollector>,
    chunk_size: u64,
}

impl PeerClient {
    pub fn new(
        peer_id: impl Into<String>,
        directory_host: impl Into<String>,
        directory_port: u16,
        advertised_host: impl Into<String>,
        advertised_port: u16,
        store: Arc<FileStore>,
        metrics: Arc<MetricsCollector>,
        chunk_size: u64,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            directory_host: directory_host.into(),
            directory_port,
            advertised_host: advertised_host.into(),
            advertised_port,
            store,
            metrics,
            chunk_size,
        }
    }

    async fn connect_directory(&self) -> FileMeshResult<TcpStream> {
        let addr = (self.directory_host.as_str(), self.directory_port);
        let stream = timeout(CONTROL_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| FileMeshError::Timeout)??;
        Ok(stream)
    }

    /// Enumerate shared files, register them with the directory, and
    /// replicate whatever tasks come back. Replication happens at most
    /// once per `register()` call — after replicating, a second
    /// registration pass runs with `perform_replication: false` in its
    /// payload so the directory can re-observe the peer's now-larger file
    /// set without this call looping on tasks it itself just satisfied.
    pub async fn register(&self) -> FileMeshResult<Envelope> {
        let resp = self.register_once(true).await?;
        let tasks = resp.payload.get("replication_tasks").and_then(|v| v.as_array());
        if let Some(tasks) = tasks {
            for task in tasks {
                let file_name = task.get("file_name").and_then(|v| v.as_str());
                let source = task.get("source");
                if let (Some(file_name), Some(source)) = (file_name, source) {
                    let host = source.get("host").and_then(|v| v.as_str()).unwrap_or_default();
                    let port = source.get("port").and_then(|v| v.as_u64()).unwrap_or(0) as u16;
                    if host.is_empty() || port == 0 {
                        continue;
                    }
                    if let Err(e) = self.replicate(host, port, file_name).await {
                        warn!("replication of '{file_name}' from {host}:{port} failed: {e}");
                    }
                }
            }
            return self.register_once(false).await;
        }
        Ok(resp)
    }

    async fn register_once(&self, perform_replication: bool) -> FileMeshResult<Envelope> {
        let files = self.store.list_servable_files().await?;
        let files_payload: serde_json::Map<String, serde_json::Value> = files
            .into_iter()
            .map(|(name, size)| (name, serde_json::json!({ "size_bytes": size })))
            .collect();

        let mut req = make_registry_request(
            &self.peer_id,
            serde_json::json!({
                "peer": { "host": self.advertised_host, "port": self.advertised_port },
                "files": files_payload,
            }),
        );
        req.payload["perform_replication"] = serde_json::Value::Bool(perform_replication);

        let mut stream = self.connect_directory().await?;
        self.exchange(&mut stream, &req).await
    }

    pub async fn search(&self, file_name: &str) -> FileMeshResult<Envelope> {
        let req = make_search_request(&self.peer_id, file_name);
        let mut stream = self.connect_directory().await?;

        let started = Instant::now();
        let resp = self.exchange(&mut stream, &req).await?;
        self.metrics.record_search_time(started.elapsed().as_secs_f64());
        Ok(resp)
    }

    /// Fetch `file_name` from `host:port` into the local download
    /// directory, streaming exactly the advertised `file_size` bytes.
    pub async fn obtain(&self, host: &str, port: u16, file_name: &str) -> FileMeshResult<PathBuf> {
        let req = make_obtain_request(&self.peer_id, file_name);
        self.transfer(host, port, &req, OBTAIN_RESPONSE, self.store.download_dir().to_path_buf())
            .await
    }

    /// Same as `obtain`, but lands bytes in the replicated directory —
    /// used when satisfying a directory-issued replication task.
    pub async fn replicate(&self, host: &str, port: u16, file_name: &str) -> FileMeshResult<PathBuf> {
        let req = make_replicate_request(&self.peer_id, file_name);
        self.transfer(
            host,
            port,
            &req,
            REPLICATE_RESPONSE,
            self.store.replicated_dir().to_path_buf(),
        )
        .await
    }

    async fn transfer(
        &self,
        host: &str,
        port: u16,
        request: &Envelope,
        expected_response_type: &str,
        dest_dir: PathBuf,
    ) -> FileMeshResult<PathBuf> {
        let mut stream = timeout(CONTROL_TIMEOUT, TcpStream::connect((host, port)))
            .await
            .map_err(|_| FileMeshError::Timeout)??;

        timeout(CONTROL_TIMEOUT, protocol::write_message(&mut stream, request))
            .await
            .map_err(|_| FileMeshError::Timeout)??;
        let (read_half, _write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let meta = timeout(CONTROL_TIMEOUT, protocol::read_message(&mut reader))
            .await
            .map_err(|_| FileMeshError::Timeout)??;
        meta.check_version()?;

        if meta.message_type != expected_response_type {
            return Err(FileMeshError::UnexpectedResponseType(meta.message_type));
        }
        if meta.payload.get("status").and_then(|v| v.as_str()) != Some("ok") {
            return Err(FileMeshError::FileNotFound);
        }

        let file_name = meta
            .payload
            .get("file_name")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| {
                request
                    .payload
                    .get("file_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
            })
            .to_string();
        let file_size = meta.payload.get("file_size").and_then(|v| v.as_u64()).unwrap_or(0);
        let chunk_size = meta
            .payload
            .get("chunk_size")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.chunk_size);

        let (path, mut file) = self.store.create_in(&dest_dir, &file_name).await?;

        let started = Instant::now();
        let copied = timeout(
            TRANSFER_TIMEOUT,
            protocol::copy_exact(&mut reader, &mut file, file_size, chunk_size),
        )
        .await
        .map_err(|_| FileMeshError::Timeout)??;
        let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);

        self.metrics.record_download(copied as f64, elapsed);
        self.metrics.record_download_speed(copied as f64 / elapsed);

        Ok(path)
    }

    async fn exchange(&self, stream: &mut TcpStream, request: &Envelope) -> FileMeshResult<Envelope> {
        timeout(CONTROL_TIMEOUT, protocol::write_message(stream, request))
            .await
            .map_err(|_| FileMeshError::Timeout)??;

        let (read_half, _write_half) = stream.split();
        let mut reader = BufReader::new(read_half);
        let response = timeout(CONTROL_TIMEOUT, protocol::read_message(&mut reader))
            .await
            .map_err(|_| FileMeshError::Timeout)??;
        response.check_version()?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_derives_offset_port() {
        assert_eq!(compute_port("peer1", 9000), 9000);
        assert_eq!(compute_port("peer2", 9000), 9001);
        assert_eq!(compute_port("peer5", 9000), 9004);
    }

    #[test]
    fn peer0_and_peer1_both_bind_base_port() {
        assert_eq!(compute_port("peer0", 9000), 9000);
        assert_eq!(compute_port("peer1", 9000), 9000);
    }

    #[test]
    fn non_numeric_suffix_falls_back_to_base_port() {
        assert_eq!(compute_port("directory", 9000), 9000);
        assert_eq!(compute_port("peer-a", 9000), 9000);
    }
}
