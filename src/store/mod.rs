//! Content-addressed checkpoint store.
//!
//! A checkpoint directory is named by `H_chk` and is immutable once written:
//! the store recomputes the hash from what it is about to publish and refuses
//! anything that does not add up. All writes go through temp-file + rename.

pub mod index;

use crate::config::Config;
use crate::error::StorageError;
use crate::hash;
use crate::unit::split_unit_id;
use crate::util::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use index::Index;

/// File name of the executable payload inside a checkpoint directory.
pub const IMPL_FILE: &str = "impl.py";
/// File name of the checkpoint metadata.
pub const META_FILE: &str = "meta.toml";

/// Diagnostic echo of the hash inputs; never trusted by the loader.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HashInputs {
    pub signature_sha: String,
    pub docstring_sha: String,
    pub pre_hole_sha: String,
    pub dependency_digest: String,
    pub template_id: String,
    pub provider_model: String,
}

/// `meta.toml` contents for one checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub spec_sha: String,
    pub chk_sha: String,
    pub prompt_sha: String,
    pub tool_version: String,
    /// Provider identity `<kind>:<model>`.
    pub provider: String,
    pub prompt_template: String,
    pub seed: u64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    /// Epoch milliseconds at write time.
    pub timestamp: u64,
    pub hash_inputs: HashInputs,
    /// Frozen dependency pins recorded by `save --freeze-http-deps`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps: Option<BTreeMap<String, String>>,
}

/// On-disk layout helper rooted at the configured checkpoints directory.
#[derive(Debug, Clone)]
pub struct Store {
    checkpoints_root: PathBuf,
    index_path: PathBuf,
}

impl Store {
    pub fn new(config: &Config) -> Self {
        Self {
            checkpoints_root: config.checkpoints_dir(),
            index_path: config.index_path(),
        }
    }

    pub fn index(&self) -> Index {
        Index::new(self.index_path.clone())
    }

    /// Directory holding every checkpoint of one unit:
    /// `<root>/<module/path>/<unit_name>/`.
    pub fn unit_dir(&self, unit_id: &str) -> PathBuf {
        match split_unit_id(unit_id) {
            Some((module_path, name)) => self
                .checkpoints_root
                .join(module_path.replace('.', "/"))
                .join(name),
            None => self.checkpoints_root.join(unit_id),
        }
    }

    pub fn checkpoint_dir(&self, unit_id: &str, chk_hash: &str) -> PathBuf {
        self.unit_dir(unit_id).join(chk_hash)
    }

    pub fn impl_path(&self, unit_id: &str, chk_hash: &str) -> PathBuf {
        self.checkpoint_dir(unit_id, chk_hash).join(IMPL_FILE)
    }

    pub fn meta_path(&self, unit_id: &str, chk_hash: &str) -> PathBuf {
        self.checkpoint_dir(unit_id, chk_hash).join(META_FILE)
    }

    /// Write a checkpoint; idempotent for identical content.
    ///
    /// The directory name is recomputed from `(spec_sha, prompt_sha,
    /// sha256(impl_bytes))`; a caller-supplied `chk_sha` that disagrees is
    /// refused before anything touches disk.
    pub fn write(
        &self,
        unit_id: &str,
        chk_sha: &str,
        impl_bytes: &[u8],
        meta: &CheckpointMeta,
    ) -> Result<PathBuf, StorageError> {
        let recomputed = hash::checkpoint_hash(
            &meta.spec_sha,
            &meta.prompt_sha,
            &hash::impl_hash(impl_bytes),
        );
        if recomputed != chk_sha || meta.chk_sha != chk_sha {
            return Err(StorageError::HashMismatchOnWrite {
                expected: chk_sha.to_string(),
                actual: recomputed,
            });
        }

        let dir = self.checkpoint_dir(unit_id, chk_sha);
        let impl_path = dir.join(IMPL_FILE);
        let meta_path = dir.join(META_FILE);

        write_atomic(&impl_path, impl_bytes).map_err(|source| StorageError::WriteFailed {
            path: impl_path.clone(),
            source,
        })?;
        let meta_text = toml::to_string_pretty(meta).map_err(|err| StorageError::MalformedMeta {
            path: meta_path.clone(),
            detail: err.to_string(),
        })?;
        write_atomic(&meta_path, meta_text.as_bytes()).map_err(|source| {
            StorageError::WriteFailed {
                path: meta_path.clone(),
                source,
            }
        })?;
        Ok(dir)
    }

    /// Read a checkpoint's payload and metadata.
    pub fn read(
        &self,
        unit_id: &str,
        chk_sha: &str,
    ) -> Result<(Vec<u8>, CheckpointMeta), StorageError> {
        let impl_path = self.impl_path(unit_id, chk_sha);
        let impl_bytes = fs::read(&impl_path).map_err(|source| StorageError::ReadFailed {
            path: impl_path,
            source,
        })?;
        let meta = self.read_meta(unit_id, chk_sha)?;
        Ok((impl_bytes, meta))
    }

    pub fn read_meta(&self, unit_id: &str, chk_sha: &str) -> Result<CheckpointMeta, StorageError> {
        let meta_path = self.meta_path(unit_id, chk_sha);
        read_meta_file(&meta_path)
    }

    /// Rewrite a checkpoint's metadata in place (dependency freezing only;
    /// the impl payload stays immutable).
    pub fn update_meta(
        &self,
        unit_id: &str,
        chk_sha: &str,
        meta: &CheckpointMeta,
    ) -> Result<(), StorageError> {
        let meta_path = self.meta_path(unit_id, chk_sha);
        let text = toml::to_string_pretty(meta).map_err(|err| StorageError::MalformedMeta {
            path: meta_path.clone(),
            detail: err.to_string(),
        })?;
        write_atomic(&meta_path, text.as_bytes()).map_err(|source| StorageError::WriteFailed {
            path: meta_path,
            source,
        })
    }

    /// All checkpoint hashes for a unit, newest first by write timestamp.
    pub fn list_checkpoints(&self, unit_id: &str) -> Vec<(String, CheckpointMeta)> {
        let unit_dir = self.unit_dir(unit_id);
        let Ok(entries) = fs::read_dir(&unit_dir) else {
            return Vec::new();
        };
        let mut checkpoints: Vec<(String, CheckpointMeta)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let meta = read_meta_file(&entry.path().join(META_FILE)).ok()?;
                Some((name, meta))
            })
            .collect();
        checkpoints.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then(a.0.cmp(&b.0)));
        checkpoints
    }

    /// Whether a checkpoint directory with a readable payload exists.
    pub fn exists(&self, unit_id: &str, chk_sha: &str) -> bool {
        self.impl_path(unit_id, chk_sha).is_file()
    }
}

fn read_meta_file(meta_path: &Path) -> Result<CheckpointMeta, StorageError> {
    let text = fs::read_to_string(meta_path).map_err(|source| StorageError::ReadFailed {
        path: meta_path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|err| StorageError::MalformedMeta {
        path: meta_path.to_path_buf(),
        detail: err.to_string(),
    })
}
