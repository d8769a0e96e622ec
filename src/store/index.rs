//! Active-checkpoint index with serialised writes.
//!
//! The index file is the only shared mutable state in the system. Writers
//! take an exclusive `flock` on a sidecar lock file, re-read, modify, and
//! publish through temp-file + rename, so concurrent activations produce a
//! total order with exactly one winner per unit.

use crate::error::StorageError;
use crate::util::{now_epoch_ms, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

const LOCK_RETRIES: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// One index entry: the active checkpoint and when it was activated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub active: String,
    pub activated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct IndexFile {
    pub units: BTreeMap<String, IndexEntry>,
}

/// Handle to the on-disk index.
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
}

impl Index {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "index.toml".to_string());
        name.push_str(".lock");
        self.path.with_file_name(name)
    }

    /// Read the whole index; a missing file is an empty index.
    pub fn load(&self) -> Result<IndexFile, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexFile::default())
            }
            Err(source) => {
                return Err(StorageError::ReadFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|err| StorageError::MalformedMeta {
            path: self.path.clone(),
            detail: err.to_string(),
        })
    }

    /// Active checkpoint hash for a unit, if any.
    pub fn active(&self, unit_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .load()?
            .units
            .get(unit_id)
            .map(|entry| entry.active.clone()))
    }

    /// Atomically point a unit at a checkpoint.
    ///
    /// Re-activating the same hash is a no-op that keeps the original
    /// activation timestamp.
    pub fn activate(&self, unit_id: &str, chk_sha: &str) -> Result<(), StorageError> {
        let _guard = IndexLock::acquire(self.lock_path())?;
        let mut file = self.load()?;
        if let Some(existing) = file.units.get(unit_id) {
            if existing.active == chk_sha {
                return Ok(());
            }
        }
        file.units.insert(
            unit_id.to_string(),
            IndexEntry {
                active: chk_sha.to_string(),
                activated_at: now_epoch_ms(),
            },
        );
        self.publish(&file)
    }

    /// Remove a unit's entry (used only by tests and future pruning).
    pub fn deactivate(&self, unit_id: &str) -> Result<(), StorageError> {
        let _guard = IndexLock::acquire(self.lock_path())?;
        let mut file = self.load()?;
        if file.units.remove(unit_id).is_some() {
            self.publish(&file)?;
        }
        Ok(())
    }

    fn publish(&self, file: &IndexFile) -> Result<(), StorageError> {
        let text = toml::to_string_pretty(file).map_err(|err| StorageError::MalformedMeta {
            path: self.path.clone(),
            detail: err.to_string(),
        })?;
        write_atomic(&self.path, text.as_bytes()).map_err(|source| StorageError::WriteFailed {
            path: self.path.clone(),
            source,
        })
    }
}

/// Exclusive advisory lock on the index sidecar file, released on drop.
struct IndexLock {
    file: fs::File,
}

impl IndexLock {
    fn acquire(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        for _ in 0..LOCK_RETRIES {
            match try_acquire_exclusive_nonblocking(&file) {
                Ok(true) => return Ok(Self { file }),
                Ok(false) => thread::sleep(LOCK_RETRY_DELAY),
                Err(source) => {
                    return Err(StorageError::WriteFailed {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Err(StorageError::IndexLockContended { path })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn try_acquire_exclusive_nonblocking(file: &fs::File) -> std::io::Result<bool> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: `fd` comes from an open `std::fs::File` that outlives this
    // call; `LOCK_EX | LOCK_NB` is a valid flock operation.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        return Ok(false);
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_acquire_exclusive_nonblocking(_file: &fs::File) -> std::io::Result<bool> {
    Ok(true)
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn unlock(file: &fs::File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: unlocking a valid descriptor we still own.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn unlock(_file: &fs::File) {}
