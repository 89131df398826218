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

//! A peer's TCP listener serving OBTAIN/REPLICATE requests by streaming
//! file bytes. One request per connection: read one framed request, reply
//! with a metadata envelope, switch to raw mode, stream the file, close.
//! No keep-alive.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{FileMeshError, FileMeshResult};
use crate::file_store::FileStore;
use crate::protocol::{self, Envelope, OBTAIN_REQUEST, OBTAIN_RESPONSE, REPLICATE_REQUEST, REPLICATE_RESPONSE};

pub struct TransferServer {
    listener: TcpListener,
    store: Arc<FileStore>,
    peer_id: String,
    chunk_size: u64,
}

impl TransferServer {
    pub async fn bind(
        host: &str,
        port: u16,
        peer_id: &str,
        store: FileStore,
        chunk_size: u64,
    ) -> FileMeshResult<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        Ok(Self {
            listener,
            store: Arc::new(store),
            peer_id: peer_id.to_string(),
            chunk_size,
        })
    }

    pub fn local_addr(&self) -> FileMeshResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> FileMeshResult<()> {
        info!(
            "transfer server for peer '{}' listening on {}",
            self.peer_id,
            self.listener.local_addr()?
        );
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let store = self.store.clone();
            let peer_id = self.peer_id.clone();
            let chunk_size = self.chunk_size;

            tokio::spawn(async move {
                debug!("accepted peer connection from {addr}");
                if let Err(e) = handle_connection(stream, &peer_id, &store, chunk_size).await {
                    warn!("transfer to {addr} failed: {e}");
                }
                debug!("closed peer connection from {addr}");
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_id: &str,
    store: &FileStore,
    chunk_size: u64,
) -> FileMeshResult<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let envelope = match protocol::read_message(&mut reader).await {
        Ok(envelope) => envelope,
        Err(FileMeshError::Truncated) => return Ok(()),
        Err(e) => return Err(e),
    };
    envelope.check_version()?;

    let response_type = match envelope.message_type.as_str() {
        OBTAIN_REQUEST => OBTAIN_RESPONSE,
        REPLICATE_REQUEST => REPLICATE_RESPONSE,
        other => {
            let resp = error_envelope(OBTAIN_RESPONSE, peer_id, &format!("unexpected message type: {other}"));
            protocol::write_message(&mut write_half, &resp).await?;
            return Ok(());
        }
    };

    let file_name = match envelope.payload.get("file_name").and_then(|v| v.as_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let resp = error_envelope(response_type, peer_id, "missing file_name");
            protocol::write_message(&mut write_half, &resp).await?;
            return Ok(());
        }
    };

    let file_size = match store.shared_file_size(&file_name).await {
        Ok(size) => size,
        Err(_) => {
            let mut resp = error_envelope(response_type, peer_id, "file_not_found");
            resp.payload["file_name"] = serde_json::Value::String(file_name);
            protocol::write_message(&mut write_half, &resp).await?;
            return Ok(());
        }
    };

    let meta = Envelope::new(
        response_type,
        serde_json::json!({
            "status": "ok",
            "file_name": file_name,
            "file_size": file_size,
            "chunk_size": chunk_size,
        }),
        Some(peer_id.to_string()),
    );
    protocol::write_message(&mut write_half, &meta).await?;

    let mut file = store.open_shared(&file_name).await?;
    protocol::copy_exact(&mut file, &mut write_half, file_size, chunk_size).await?;
    write_half.shutdown().await?;
    Ok(())
}

fn error_envelope(response_type: &str, peer_id: &str, error: &str) -> Envelope {
    Envelope::new(
        response_type,
        serde_json::json!({ "status": "error", "error": error }),
        Some(peer_id.to_string()),
    )
}
