//! Durable file backend
//!
//! One file per key under a data directory. File names are the hex encoding
//! of the key so arbitrary sensor ids (slashes, colons, dots) stay inside the
//! directory. Writes go to a temp file first and are renamed into place,
//! which gives the per-key atomicity `KvStore::put` requires.
//!
//! ```text
//! put(key, value)                      (blocking pool, runs to completion)
//!   ├─ write + fsync   {hex}.tmp-{pid}-{seq}
//!   ├─ rename          → {hex}.json     commit point
//!   └─ fsync           data directory
//! ```
//!
//! The commit runs on the blocking pool, so dropping the `put` future never
//! interrupts a write halfway. Temp files left by a crash are swept on open.

use crate::traits::KvStore;
use async_trait::async_trait;
use bytes::Bytes;
use errors::{CityError, CityResult};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

const RECORD_EXT: &str = "json";
const TMP_MARKER: &str = ".tmp-";

/// File-per-key backend rooted at a data directory
pub struct FileKvStore {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// Temp files from interrupted writes are removed; they were never
    /// renamed into place, so no committed record refers to them.
    pub async fn open(root: impl Into<PathBuf>) -> CityResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            CityError::Storage(format!(
                "cannot create data directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let swept = sweep_temp_files(&root).await?;
        if swept > 0 {
            info!("Removed {} stale temp files from {}", swept, root.display());
        }
        debug!("File store opened at {}", root.display());
        Ok(Self {
            root,
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", encode_key(key), RECORD_EXT))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            "{}{}{}-{}",
            encode_key(key),
            TMP_MARKER,
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> CityResult<Option<Bytes>> {
        match tokio::fs::read(self.record_path(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CityError::Storage(format!("read {}: {}", key, e))),
        }
    }

    async fn put(&self, key: &str, value: Bytes) -> CityResult<()> {
        let tmp = self.tmp_path(key);
        let target = self.record_path(key);
        let root = self.root.clone();

        tokio::task::spawn_blocking(move || commit_record(&root, tmp, &target, &value))
            .await
            .map_err(|e| CityError::Storage(format!("write {}: commit task failed: {}", key, e)))?
            .map_err(|e| CityError::Storage(format!("write {}: {}", key, e)))
    }

    async fn delete(&self, key: &str) -> CityResult<bool> {
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CityError::Storage(format!("delete {}: {}", key, e))),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> CityResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| CityError::Storage(format!("list {}: {}", self.root.display(), e)))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CityError::Storage(format!("list {}: {}", self.root.display(), e)))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(stem) = name.strip_suffix(&format!(".{}", RECORD_EXT)) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

/// Temp file that is removed on drop unless it was renamed into place
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Temp file cleanup failed {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Write `value` to `tmp`, fsync it, rename over `target`, fsync the directory
///
/// The rename is the commit point. A failed directory fsync after it is
/// logged, not returned, since the new record is already visible.
fn commit_record(root: &Path, tmp: PathBuf, target: &Path, value: &[u8]) -> io::Result<()> {
    let mut guard = TempFile {
        path: tmp,
        committed: false,
    };

    let mut file = File::create(&guard.path)?;
    file.write_all(value)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&guard.path, target)?;
    guard.committed = true;

    if let Err(e) = sync_dir(root) {
        warn!("Directory fsync failed {}: {}", root.display(), e);
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Remove leftover temp files, returning how many were deleted
async fn sweep_temp_files(root: &Path) -> CityResult<usize> {
    let list_err = |e: io::Error| CityError::Storage(format!("list {}: {}", root.display(), e));
    let mut entries = tokio::fs::read_dir(root).await.map_err(list_err)?;

    let mut swept = 0;
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let file_name = entry.file_name();
        if !file_name.to_str().is_some_and(|n| n.contains(TMP_MARKER)) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => swept += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => warn!("Stale temp file not removed {}: {}", entry.path().display(), e),
        }
    }
    Ok(swept)
}

/// Encode a key as lowercase hex
fn encode_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 2);
    for byte in key.as_bytes() {
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02x}", byte);
    }
    result
}

/// Decode a hex file stem back into a key; foreign files yield `None`
fn decode_key(stem: &str) -> Option<String> {
    if stem.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..stem.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(stem.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
