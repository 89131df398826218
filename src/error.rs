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

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileMeshError {
    #[error("IO error {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("malformed frame")]
    Malformed,

    #[error("connection closed before a complete frame arrived")]
    Truncated,

    #[error("file_not_found")]
    FileNotFound,

    #[error("unexpected response type: {0}")]
    UnexpectedResponseType(String),

    #[error("mismatching protocol version, expected {expected}, received {received}")]
    VersionMismatch { expected: String, received: String },

    #[error("operation timed out")]
    Timeout,
}

pub type FileMeshResult<T> = std::result::Result<T, FileMeshError>;
