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

//! The directory's TCP accept loop. One worker per accepted connection,
//! each serially processing framed REGISTRY_REQUEST/SEARCH_REQUEST
//! messages in request order until the peer disconnects or a read fails.
//! On read error the connection is closed; the peer is never removed from
//! the index on a socket error — peer lifetime is logical, not
//! connection-bound (spec.md §9).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{FileMeshError, FileMeshResult};
use crate::index::FileIndex;
use crate::protocol::{self, Envelope, REGISTRY_REQUEST, SEARCH_REQUEST};
use crate::registry::{self, RegistryHandler};
use crate::search::SearchHandler;

pub struct DirectoryServer {
    listener: TcpListener,
    index: Arc<FileIndex>,
    replication_factor: u32,
    max_tasks: usize,
}

impl DirectoryServer {
    pub async fn bind(
        host: &str,
        port: u16,
        replication_factor: u32,
        max_tasks: usize,
    ) -> FileMeshResult<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            listener,
            index: Arc::new(FileIndex::new()),
            replication_factor,
            max_tasks,
        })
    }

    pub fn local_addr(&self) -> FileMeshResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn index(&self) -> Arc<FileIndex> {
        self.index.clone()
    }

    pub async fn run(self) -> FileMeshResult<()> {
        info!(
            "directory server listening on {}",
            self.listener.local_addr()?
        );
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let index = self.index.clone();
            let replication_factor = self.replication_factor;
            let max_tasks = self.max_tasks;

            tokio::spawn(async move {
                debug!("accepted connection from {addr}");
                if let Err(e) =
                    handle_connection(stream, addr, index, replication_factor, max_tasks).await
                {
                    warn!("connection from {addr} closed: {e}");
                }
                debug!("closed connection from {addr}");
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    index: Arc<FileIndex>,
    replication_factor: u32,
    max_tasks: usize,
) -> FileMeshResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let envelope = match protocol::read_message(&mut reader).await {
            Ok(envelope) => envelope,
            Err(FileMeshError::Truncated) => return Ok(()),
            Err(e @ FileMeshError::Malformed) => return Err(e),
            Err(e) => return Err(e),
        };
        envelope.check_version()?;

        let response = dispatch(&envelope, addr, &index, replication_factor, max_tasks);
        protocol::write_message(&mut write_half, &response).await?;
    }
}

fn dispatch(
    envelope: &Envelope,
    addr: SocketAddr,
    index: &FileIndex,
    replication_factor: u32,
    max_tasks: usize,
) -> Envelope {
    match envelope.message_type.as_str() {
        REGISTRY_REQUEST => RegistryHandler::new(index, replication_factor, max_tasks).handle(envelope, addr),
        SEARCH_REQUEST => SearchHandler::new(index).handle(envelope),
        other => registry::unknown_message_type(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{make_registry_request, make_search_request, REGISTRY_RESPONSE, SEARCH_RESPONSE};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn connect(addr: SocketAddr) -> (BufReader<tokio::net::tcp::OwnedReadHalf>, tokio::net::tcp::OwnedWriteHalf) {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (r, w) = stream.into_split();
        (BufReader::new(r), w)
    }

    #[tokio::test]
    async fn register_then_search_finds_peer() {
        let server = DirectoryServer::bind("127.0.0.1", 0, 2, 5).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let (mut r, mut w) = connect(addr).await;
        let req = make_registry_request(
            "peer1",
            serde_json::json!({
                "files": {"a.txt": {}, "b.bin": {}},
                "peer": {"host": "127.0.0.1", "port": 7100}
            }),
        );
        w.write_all(&protocol::serialize(&req).unwrap()).await.unwrap();
        let resp = protocol::read_message(&mut r).await.unwrap();
        assert_eq!(resp.message_type, REGISTRY_RESPONSE);
        assert_eq!(resp.payload["registered_files"], 2);

        let (mut r2, mut w2) = connect(addr).await;
        let search = make_search_request("peer2", "a.txt");
        w2.write_all(&protocol::serialize(&search).unwrap()).await.unwrap();
        let resp2 = protocol::read_message(&mut r2).await.unwrap();
        assert_eq!(resp2.message_type, SEARCH_RESPONSE);
        let results = resp2.payload["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["peer_id"], "peer1");
        assert_eq!(results[0]["peer"]["host"], "127.0.0.1");
        assert_eq!(results[0]["peer"]["port"], 7100);
    }

    #[tokio::test]
    async fn malformed_frame_closes_connection_server_stays_up() {
        let server = DirectoryServer::bind("127.0.0.1", 0, 2, 5).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"{not json}\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "server should close the connection without responding");

        // Server must still be accepting new connections.
        let (mut r, mut w) = connect(addr).await;
        let req = make_search_request("peer1", "a.txt");
        w.write_all(&protocol::serialize(&req).unwrap()).await.unwrap();
        let resp = protocol::read_message(&mut r).await.unwrap();
        assert_eq!(resp.message_type, SEARCH_RESPONSE);
    }

    #[tokio::test]
    async fn mismatched_major_version_closes_connection_server_stays_up() {
        let server = DirectoryServer::bind("127.0.0.1", 0, 2, 5).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut req = make_search_request("peer1", "a.txt");
        req.version = "2.0".to_string();
        stream.write_all(&protocol::serialize(&req).unwrap()).await.unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(n, 0, "server should close the connection without responding");

        let (mut r, mut w) = connect(addr).await;
        let req = make_search_request("peer1", "a.txt");
        w.write_all(&protocol::serialize(&req).unwrap()).await.unwrap();
        let resp = protocol::read_message(&mut r).await.unwrap();
        assert_eq!(resp.message_type, SEARCH_RESPONSE);
    }

    #[tokio::test]
    async fn unknown_message_type_gets_generic_error() {
        let server = DirectoryServer::bind("127.0.0.1", 0, 2, 5).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());

        let (mut r, mut w) = connect(addr).await;
        let req = Envelope::new("BOGUS_REQUEST", serde_json::json!({}), None);
        w.write_all(&protocol::serialize(&req).unwrap()).await.unwrap();
        let resp = protocol::read_message(&mut r).await.unwrap();
        assert_eq!(resp.message_type, REGISTRY_RESPONSE);
        assert_eq!(resp.payload["status"], "error");
    }
}
