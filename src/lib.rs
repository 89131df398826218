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

//! filemesh — a peer-to-peer file sharing network with a central
//! directory. The directory indexes which peers serve which files and
//! hands out replication work on registration; peers exchange files
//! directly with each other over a second, file-transfer protocol.
//!
//! See [`directory_server`] and [`transfer_server`] for the two TCP
//! services, [`peer_client`] for the peer-side wire operations, and
//! [`protocol`] for the shared envelope codec.

#[macro_use]
extern crate log;

pub mod config;
pub mod directory_server;
pub mod error;
pub mod file_store;
pub mod index;
pub mod metrics;
pub mod peer_client;
pub mod protocol;
pub mod registry;
pub mod replication;
pub mod search;
pub mod transfer_server;

pub use config::Config;
pub use error::{FileMeshError, FileMeshResult};
