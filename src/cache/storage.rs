// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::request::{Request, Response};

/// Errors from opening, reading, writing or deleting stores.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to add {url} to the cache: {reason}")]
    Add { url: String, reason: String },

    #[error("invalid store name '{0}'")]
    InvalidName(String),

    #[error("cache {0} has not been installed")]
    NotInstalled(String),

    #[error("cache entry {0} is corrupt")]
    Corrupt(String),

    #[error("cache storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One named store of request → response entries.
pub trait CacheStore: Send + Sync + 'static {
    /// Looks up the response stored for the request.
    fn match_request(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Option<Response>, CacheError>> + Send;

    /// Stores the response for the request, replacing any previous entry.
    fn put(
        &self,
        request: &Request,
        response: Response,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Stores a batch of entries.
    fn put_all(
        &self,
        entries: Vec<(Request, Response)>,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            for (request, response) in entries {
                self.put(&request, response).await?;
            }
            Ok(())
        }
    }
}

/// The set of named stores.
pub trait CacheStorage: Send + Sync + 'static {
    type Store: CacheStore;

    /// Opens the named store, creating it if it doesn't exist.
    fn open(&self, name: &str) -> impl Future<Output = Result<Self::Store, CacheError>> + Send;

    /// Lists the names of every store, sorted.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>, CacheError>> + Send;

    /// Deletes the named store. Returns false if it didn't exist.
    fn delete(&self, name: &str) -> impl Future<Output = Result<bool, CacheError>> + Send;
}

/// Suffix counter for temporary entry files. Every write gets its own file.
static NEXT_WRITE_ID: AtomicU64 = AtomicU64::new(1);

type Entries = Arc<Mutex<HashMap<String, Response>>>;

/// Stores kept in memory for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    stores: Arc<Mutex<BTreeMap<String, Entries>>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage.
    pub fn new() -> MemoryCacheStorage {
        MemoryCacheStorage::default()
    }
}

/// A store held in memory.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Entries,
}

impl MemoryStore {
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the URLs of every entry, sorted.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.entries.lock().keys().cloned().collect();
        urls.sort();
        urls
    }
}

impl CacheStore for MemoryStore {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        Ok(self.entries.lock().get(&request.url()).cloned())
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), CacheError> {
        self.entries.lock().insert(request.url(), response);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<(), CacheError> {
        let mut stored = self.entries.lock();
        for (request, response) in entries {
            stored.insert(request.url(), response);
        }
        Ok(())
    }
}

impl CacheStorage for MemoryCacheStorage {
    type Store = MemoryStore;

    async fn open(&self, name: &str) -> Result<MemoryStore, CacheError> {
        let entries = self
            .stores
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();
        Ok(MemoryStore { entries })
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.stores.lock().keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.stores.lock().remove(name).is_some())
    }
}

/// Stores persisted under a directory: one subdirectory per store, one file per entry.
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Creates a storage rooted at the directory. The directory is created on first open.
    pub fn new(root: &Path) -> DiskCacheStorage {
        DiskCacheStorage {
            root: root.to_path_buf(),
        }
    }

    fn store_dir(&self, name: &str) -> Result<PathBuf, CacheError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(CacheError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

/// A store persisted in a directory.
pub struct DiskStore {
    dir: PathBuf,
}

/// Escapes a URL into a file name. Bytes other than ASCII alphanumerics, `-`, `_` and `.`
/// become `%XX`, so the mapping is reversible and never contains a path separator.
fn entry_file_name(url: &str) -> String {
    let mut name = String::with_capacity(url.len());
    for byte in url.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            name.push(byte as char);
        } else {
            let _ = write!(name, "%{:02X}", byte);
        }
    }
    name
}

/// Entries are a three-digit status line followed by the body.
fn encode_entry(response: &Response) -> Vec<u8> {
    let mut encoded = format!("{:03}\n", response.status()).into_bytes();
    encoded.extend_from_slice(response.body());
    encoded
}

fn decode_entry(url: &str, encoded: Vec<u8>) -> Result<Response, CacheError> {
    let corrupt = || CacheError::Corrupt(url.to_string());
    if encoded.len() < 4 || encoded[3] != b'\n' {
        return Err(corrupt());
    }
    let status = std::str::from_utf8(&encoded[..3])
        .ok()
        .and_then(|status| status.parse::<u16>().ok())
        .ok_or_else(corrupt)?;
    Ok(Response::new(status, encoded[4..].to_vec()))
}

impl DiskStore {
    fn entry_path(&self, request: &Request) -> PathBuf {
        self.dir.join(entry_file_name(&request.url()))
    }

    fn temp_path(&self, request: &Request) -> PathBuf {
        self.dir.join(format!(
            ".{}.{}.tmp",
            entry_file_name(&request.url()),
            NEXT_WRITE_ID.fetch_add(1, Ordering::Relaxed)
        ))
    }
}

impl CacheStore for DiskStore {
    async fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        match tokio::fs::read(self.entry_path(request)).await {
            Ok(encoded) => Ok(Some(decode_entry(&request.url(), encoded)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), CacheError> {
        let temp = self.temp_path(request);
        if let Err(e) = tokio::fs::write(&temp, encode_entry(&response)).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&temp, self.entry_path(request)).await?;
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(Request, Response)>) -> Result<(), CacheError> {
        let temps: Vec<PathBuf> = entries
            .iter()
            .map(|(request, _)| self.temp_path(request))
            .collect();

        // Write everything aside first so a failed write leaves no partial batch visible.
        for ((_, response), temp) in entries.iter().zip(temps.iter()) {
            if let Err(e) = tokio::fs::write(temp, encode_entry(response)).await {
                for temp in temps.iter() {
                    let _ = tokio::fs::remove_file(temp).await;
                }
                return Err(e.into());
            }
        }
        for ((request, _), temp) in entries.iter().zip(temps.iter()) {
            tokio::fs::rename(temp, self.entry_path(request)).await?;
        }
        Ok(())
    }
}

impl CacheStorage for DiskCacheStorage {
    type Store = DiskStore;

    async fn open(&self, name: &str) -> Result<DiskStore, CacheError> {
        let dir = self.store_dir(name)?;
        tokio::fs::create_dir_all(&dir).await?;
        debug!(store = name, dir = ?dir, "Opened store");
        Ok(DiskStore { dir })
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        match tokio::fs::remove_dir_all(self.store_dir(name)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
