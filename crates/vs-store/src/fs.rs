use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use vs_types::{Blob, BlobMeta, ContentHash};

use crate::error::{StoreError, StoreResult};
use crate::key::TableKey;
use crate::traits::{BlobStore, RecordTable};

/// Write `data` to `path` through a temp file in the same directory and an
/// atomic rename. Readers never observe a partially written file.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// Filesystem blob store.
///
/// Layout: `<root>/<first-2-hex>/<hash>.bin` holds the bytes and
/// `<root>/<first-2-hex>/<hash>.json` the [`BlobMeta`]. The metadata file is
/// written last, so its presence marks a complete blob.
pub struct FsBlobStore {
    root: PathBuf,
    /// Serializes writers so the first upload's metadata wins.
    writer: Mutex<()>,
}

impl FsBlobStore {
    /// Open (or create) a blob store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened filesystem blob store");
        Ok(Self {
            root,
            writer: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_dir(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(&hex[..2])
    }

    fn data_path(&self, hash: &ContentHash) -> PathBuf {
        self.shard_dir(hash).join(format!("{}.bin", hash.to_hex()))
    }

    fn meta_path(&self, hash: &ContentHash) -> PathBuf {
        self.shard_dir(hash).join(format!("{}.json", hash.to_hex()))
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, blob: &Blob) -> StoreResult<ContentHash> {
        let hash = blob.hash();
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if self.meta_path(&hash).exists() {
            debug!(hash = %hash.short_hex(), "blob already stored");
            return Ok(hash);
        }
        write_atomic(&self.data_path(&hash), &blob.bytes)?;
        let meta = serde_json::to_vec_pretty(&blob.meta)?;
        write_atomic(&self.meta_path(&hash), &meta)?;
        debug!(hash = %hash.short_hex(), size = blob.meta.size, "stored blob");
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> StoreResult<Option<Blob>> {
        let Some(meta) = self.meta(hash)? else {
            return Ok(None);
        };
        let bytes = read_optional(&self.data_path(hash))?.ok_or_else(|| {
            StoreError::CorruptRecord {
                key: hash.to_hex(),
                reason: "metadata present but data file missing".into(),
            }
        })?;
        let computed = ContentHash::of(&bytes);
        if computed != *hash {
            return Err(StoreError::HashMismatch {
                hash: *hash,
                computed,
            });
        }
        Ok(Some(Blob { meta, bytes }))
    }

    fn meta(&self, hash: &ContentHash) -> StoreResult<Option<BlobMeta>> {
        match read_optional(&self.meta_path(hash))? {
            Some(raw) => {
                let meta = serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptRecord {
                    key: hash.to_hex(),
                    reason: e.to_string(),
                })?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    fn exists(&self, hash: &ContentHash) -> StoreResult<bool> {
        Ok(self.meta_path(hash).exists())
    }

    fn hashes(&self) -> StoreResult<Vec<ContentHash>> {
        let mut hashes = Vec::new();
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match ContentHash::from_hex(stem) {
                    Ok(hash) => hashes.push(hash),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping stray file"),
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

impl std::fmt::Debug for FsBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsBlobStore")
            .field("root", &self.root)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Record table
// ---------------------------------------------------------------------------

/// Filesystem record table: one pretty-printed JSON file per key,
/// `<root>/<storage_key>.json`.
pub struct FsTable<K, V> {
    root: PathBuf,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K: TableKey, V> FsTable<K, V> {
    /// Open (or create) a table rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            _marker: PhantomData,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &K) -> PathBuf {
        self.root.join(format!("{}.json", key.storage_key()))
    }
}

impl<K, V> RecordTable<K, V> for FsTable<K, V>
where
    K: TableKey,
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn load(&self, key: &K) -> StoreResult<Option<V>> {
        match read_optional(&self.path(key))? {
            Some(raw) => {
                let value = serde_json::from_slice(&raw).map_err(|e| StoreError::CorruptRecord {
                    key: key.storage_key(),
                    reason: e.to_string(),
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn save(&self, key: &K, value: &V) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.path(key), &data)?;
        Ok(())
    }

    fn list(&self) -> StoreResult<Vec<V>> {
        let mut values = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read(&path)?;
            match serde_json::from_slice(&raw) {
                Ok(value) => values.push(value),
                Err(e) => {
                    return Err(StoreError::CorruptRecord {
                        key: path.display().to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(values)
    }
}

impl<K, V> std::fmt::Debug for FsTable<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsTable").field("root", &self.root).finish()
    }
}
