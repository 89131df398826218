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

//! Wire codec: one JSON envelope per line (framed mode), followed on the
//! same connection by an exact count of raw file bytes (raw mode) once a
//! transfer has been negotiated. See the message types below for the
//! recognized envelope `type`s.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{FileMeshError, FileMeshResult};

pub const PROTOCOL_VERSION: &str = "1.0";

pub const REGISTRY_REQUEST: &str = "REGISTRY_REQUEST";
pub const REGISTRY_RESPONSE: &str = "REGISTRY_RESPONSE";
pub const SEARCH_REQUEST: &str = "SEARCH_REQUEST";
pub const SEARCH_RESPONSE: &str = "SEARCH_RESPONSE";
pub const OBTAIN_REQUEST: &str = "OBTAIN_REQUEST";
pub const OBTAIN_RESPONSE: &str = "OBTAIN_RESPONSE";
pub const REPLICATE_REQUEST: &str = "REPLICATE_REQUEST";
pub const REPLICATE_RESPONSE: &str = "REPLICATE_RESPONSE";

/// One framed control message. `payload` is left as an open-ended JSON
/// value — handlers pick apart the shape they expect for their `type`;
/// unknown fields are simply never read, matching spec.md's "unknown
/// fields are ignored on decode" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,

    pub timestamp: i64,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub peer_id: Option<String>,

    #[serde(default)]
    pub request_id: Option<String>,

    #[serde(default)]
    pub payload: Value,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Envelope {
    pub fn new(message_type: &str, payload: Value, peer_id: Option<String>) -> Self {
        Self {
            message_type: message_type.to_string(),
            timestamp: epoch_millis(),
            version: PROTOCOL_VERSION.to_string(),
            peer_id,
            request_id: None,
            payload,
        }
    }

    pub fn check_version(&self) -> FileMeshResult<()> {
        let major = self.version.split('.').next().unwrap_or("");
        let expected_major = PROTOCOL_VERSION.split('.').next().unwrap_or("");
        if major != expected_major {
            return Err(FileMeshError::VersionMismatch {
                expected: PROTOCOL_VERSION.to_string(),
                received: self.version.clone(),
            });
        }
        Ok(())
    }
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn serialize(message: &Envelope) -> FileMeshResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn parse_line(line: &[u8]) -> FileMeshResult<Envelope> {
    let text = std::str::from_utf8(line).map_err(|_| FileMeshError::Malformed)?;
    serde_json::from_str(text).map_err(|_| FileMeshError::Malformed)
}

/// Read exactly one framed message: accumulate bytes until the first
/// `\n`, decode the preceding bytes as a single JSON object, discard the
/// delimiter. Fails with `Truncated` if the peer closes the connection
/// before a newline arrives.
pub async fn read_message<R>(reader: &mut BufReader<R>) -> FileMeshResult<Envelope>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Err(FileMeshError::Truncated);
    }
    if line.last() != Some(&b'\n') {
        return Err(FileMeshError::Truncated);
    }
    line.pop();
    parse_line(&line)
}

/// Write one framed message with its trailing `\n`.
pub async fn write_message<W>(writer: &mut W, message: &Envelope) -> FileMeshResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = serialize(message)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Copy exactly `total` bytes from `reader` to `writer`, in increments no
/// larger than `chunk_size`. Sized by the advertised length, never by EOF
/// alone, so truncation is detectable by the caller (a short read simply
/// returns fewer bytes than `total`, which the caller treats as partial).
pub async fn copy_exact<R, W>(
    reader: &mut R,
    writer: &mut W,
    total: u64,
    chunk_size: u64,
) -> FileMeshResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut remaining = total;
    let mut copied = 0u64;
    let mut buf = vec![0u8; chunk_size.min(total.max(1)) as usize];

    while remaining > 0 {
        let want = chunk_size.min(remaining) as usize;
        if buf.len() < want {
            buf.resize(want, 0);
        }
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        remaining -= n as u64;
        copied += n as u64;
    }
    writer.flush().await?;
    Ok(copied)
}

// ---- Preset message builders, mirroring the original protocol helpers ----

pub fn make_registry_request(peer_id: &str, payload: Value) -> Envelope {
    Envelope::new(REGISTRY_REQUEST, payload, Some(peer_id.to_string()))
}

pub fn make_search_request(peer_id: &str, file_name: &str) -> Envelope {
    Envelope::new(
        SEARCH_REQUEST,
        serde_json::json!({ "query": file_name }),
        Some(peer_id.to_string()),
    )
}

pub fn make_obtain_request(peer_id: &str, file_name: &str) -> Envelope {
    Envelope::new(
        OBTAIN_REQUEST,
        serde_json::json!({ "file_name": file_name }),
        Some(peer_id.to_string()),
    )
}

pub fn make_replicate_request(peer_id: &str, file_name: &str) -> Envelope {
    Envelope::new(
        REPLICATE_REQUEST,
        serde_json::json!({ "file_name": file_name }),
        Some(peer_id.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_has_single_trailing_newline() {
        let msg = make_search_request("peer1", "a.txt");
        let bytes = serialize(&msg).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn round_trip_preserves_fields() {
        let msg = make_registry_request("peer1", serde_json::json!({"files": {}}));
        let bytes = serialize(&msg).unwrap();
        let line = &bytes[..bytes.len() - 1];
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.message_type, REGISTRY_REQUEST);
        assert_eq!(parsed.peer_id.as_deref(), Some("peer1"));
        assert_eq!(parsed.version, PROTOCOL_VERSION);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_line(b"{not json}").unwrap_err();
        assert!(matches!(err, FileMeshError::Malformed));
    }

    #[test]
    fn non_utf8_is_rejected() {
        let err = parse_line(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, FileMeshError::Malformed));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = parse_line(br#"{"timestamp": 1, "payload": {}}"#).unwrap_err();
        assert!(matches!(err, FileMeshError::Malformed));
    }

    #[test]
    fn version_mismatch_detected_on_major() {
        let mut msg = make_search_request("peer1", "a.txt");
        msg.version = "2.0".to_string();
        assert!(msg.check_version().is_err());
    }
}
