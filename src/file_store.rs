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

//! Adapter over a peer's three on-disk directories (`shared/`,
//! `downloaded/`, `replicated/`). Enumerates locally shared files and
//! streams chunks in and out of them. The directory layout itself — and
//! the dataset generator that populates `shared/` — is a collaborator
//! contract (spec.md §1); this module only consumes it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::FileMeshResult;

#[derive(Debug, Clone)]
pub struct FileStore {
    shared_dir: PathBuf,
    download_dir: PathBuf,
    replicated_dir: PathBuf,
}

impl FileStore {
    pub fn new(
        shared_dir: impl Into<PathBuf>,
        download_dir: impl Into<PathBuf>,
        replicated_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            shared_dir: shared_dir.into(),
            download_dir: download_dir.into(),
            replicated_dir: replicated_dir.into(),
        }
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn replicated_dir(&self) -> &Path {
        &self.replicated_dir
    }

    /// Mapping of `file_name -> size_bytes` for regular files directly
    /// under the shared directory.
    pub async fn list_shared_files(&self) -> FileMeshResult<HashMap<String, u64>> {
        list_dir(&self.shared_dir).await
    }

    /// Mapping of `file_name -> size_bytes` for everything this peer can
    /// currently serve over the transfer protocol: shared files plus
    /// anything picked up via replication. Used when registering, so a
    /// re-registration after satisfying replication tasks reports the
    /// newly held files (spec.md §4.8). Shared wins on a name collision.
    pub async fn list_servable_files(&self) -> FileMeshResult<HashMap<String, u64>> {
        let mut files = list_dir(&self.replicated_dir).await?;
        files.extend(list_dir(&self.shared_dir).await?);
        Ok(files)
    }

    /// Resolve `file_name` to a servable path and stat it, checking the
    /// shared directory first and falling back to the replicated
    /// directory. Fails with `FileNotFound` if neither holds a regular
    /// file by that name.
    pub async fn shared_file_size(&self, file_name: &str) -> FileMeshResult<u64> {
        let path = self.servable_path(file_name).await?;
        Ok(fs::metadata(&path).await?.len())
    }

    pub async fn open_shared(&self, file_name: &str) -> FileMeshResult<fs::File> {
        let path = self.servable_path(file_name).await?;
        Ok(fs::File::open(path).await?)
    }

    async fn servable_path(&self, file_name: &str) -> FileMeshResult<PathBuf> {
        let shared = self.shared_dir.join(file_name);
        if is_regular_file(&shared).await {
            return Ok(shared);
        }
        let replicated = self.replicated_dir.join(file_name);
        if is_regular_file(&replicated).await {
            return Ok(replicated);
        }
        Err(crate::error::FileMeshError::FileNotFound)
    }

    pub async fn list_downloaded_files(&self) -> FileMeshResult<HashMap<String, u64>> {
        list_dir(&self.download_dir).await
    }

    pub async fn list_replicated_files(&self) -> FileMeshResult<HashMap<String, u64>> {
        list_dir(&self.replicated_dir).await
    }

    /// Create (truncating) `<dir>/<file_name>` for writing, creating the
    /// directory if needed.
    pub async fn create_in(&self, dir: &Path, file_name: &str) -> FileMeshResult<(PathBuf, fs::File)> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(file_name);
        let file = fs::File::create(&path).await?;
        Ok((path, file))
    }
}

async fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

async fn list_dir(dir: &Path) -> FileMeshResult<HashMap<String, u64>> {
    fs::create_dir_all(dir).await?;
    let mut out = HashMap::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            out.insert(name.to_string(), metadata.len());
        }
    }
    Ok(out)
}
