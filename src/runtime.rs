//! Runtime loader: resolve a unit id to an executable artifact under the
//! active run mode.
//!
//! Prod never generates: a missing checkpoint or a spec that drifted from
//! the activated one is fatal before any artifact is touched. Dev
//! transparently recompiles, verifies, and activates, then loads the fresh
//! checkpoint.

use crate::config::RunMode;
use crate::error::{Error, GateFailure, IntegrityError, Result};
use crate::exec::ExecLimits;
use crate::hash;
use crate::introspect::Introspector;
use crate::unit::{Example, Spec};
use crate::util::short_hash;
use crate::workflow::{compile_unit, Pipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// An executable binding for one activated checkpoint.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub unit_id: String,
    pub chk_sha: String,
    pub impl_path: PathBuf,
}

impl LoadedArtifact {
    /// Invoke the artifact with a call expression and return the output a
    /// session would print (captured stdout plus the repr of the result).
    pub fn invoke(&self, expr: &str, introspector: &dyn Introspector) -> Result<String> {
        let example = Example {
            input_source: expr.to_string(),
            expected_output: String::new(),
        };
        let run = introspector
            .run_examples(
                &self.impl_path,
                std::slice::from_ref(&example),
                ExecLimits::timeout_only(Duration::from_secs(30)),
            )
            .map_err(|detail| {
                Error::Gate(GateFailure {
                    unit_id: self.unit_id.clone(),
                    category: crate::error::GateCategory::Sandbox,
                    detail,
                })
            })?;
        Ok(run.outputs.into_iter().next().unwrap_or_default())
    }
}

/// Loader with per-process memoisation keyed by `(unit_id, H_chk)`.
pub struct Loader<'a> {
    pipeline: &'a Pipeline<'a>,
    loaded: Mutex<HashMap<(String, String), LoadedArtifact>>,
}

impl<'a> Loader<'a> {
    pub fn new(pipeline: &'a Pipeline<'a>) -> Self {
        Self {
            pipeline,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a unit id to an executable artifact, enforcing the mode's
    /// integrity rules.
    pub fn load(&self, unit_id: &str) -> Result<LoadedArtifact> {
        let specs = self.pipeline.scan()?;
        let spec = crate::spec::scan::find_unit(&specs, unit_id)?;
        let mode = self.pipeline.config.mode()?;
        self.load_spec(&spec, mode)
    }

    fn load_spec(&self, spec: &Spec, mode: RunMode) -> Result<LoadedArtifact> {
        let store = self.pipeline.store();
        let template_id = crate::prompt::resolve_template_id(spec, self.pipeline.config);
        let provider_config = self.pipeline.config.provider(&spec.provider_ref);
        let current_spec_sha = hash::spec_hash(spec, &template_id, &provider_config);

        let active = store.index().active(&spec.unit_id)?;
        let active = match active {
            Some(chk_sha) if store.exists(&spec.unit_id, &chk_sha) => Some(chk_sha),
            _ => None,
        };

        match active {
            Some(chk_sha) => {
                let meta = store.read_meta(&spec.unit_id, &chk_sha)?;
                if meta.spec_sha == current_spec_sha {
                    if mode == RunMode::Prod {
                        self.verify_content(&store, &spec.unit_id, &chk_sha)?;
                    }
                    return Ok(self.bind(&store, &spec.unit_id, &chk_sha));
                }
                match mode {
                    RunMode::Prod => Err(Error::Integrity(IntegrityError::HashMismatch {
                        unit_id: spec.unit_id.clone(),
                        active: meta.spec_sha,
                        current: current_spec_sha,
                    })),
                    RunMode::Dev => {
                        eprintln!(
                            "warning: {} drifted (active spec {}, current spec {}); regenerating",
                            spec.unit_id,
                            short_hash(&meta.spec_sha),
                            short_hash(&current_spec_sha)
                        );
                        self.regenerate(spec, &store)
                    }
                }
            }
            None => match mode {
                RunMode::Prod => Err(Error::Integrity(IntegrityError::CheckpointMissing {
                    unit_id: spec.unit_id.clone(),
                })),
                RunMode::Dev => {
                    eprintln!(
                        "warning: {} has no active checkpoint; compiling (dev)",
                        spec.unit_id
                    );
                    self.regenerate(spec, &store)
                }
            },
        }
    }

    /// Dev-mode convergence: compile, verify, activate, then bind.
    fn regenerate(&self, spec: &Spec, store: &crate::store::Store) -> Result<LoadedArtifact> {
        let outcome = compile_unit(self.pipeline, spec, false)?;
        let impl_path = store.impl_path(&spec.unit_id, &outcome.chk_sha);
        let report = self.pipeline.harness().verify(spec, &impl_path);
        if let Some(failure) = report.failures().first() {
            return Err(Error::Gate(GateFailure {
                unit_id: spec.unit_id.clone(),
                category: failure.gate,
                detail: failure.detail.clone(),
            }));
        }
        store.index().activate(&spec.unit_id, &outcome.chk_sha)?;
        Ok(self.bind(store, &spec.unit_id, &outcome.chk_sha))
    }

    /// Prod-mode content addressing: the directory name must re-derive from
    /// the metadata and payload bytes.
    fn verify_content(
        &self,
        store: &crate::store::Store,
        unit_id: &str,
        chk_sha: &str,
    ) -> Result<()> {
        let (impl_bytes, meta) = store.read(unit_id, chk_sha)?;
        let recomputed = hash::checkpoint_hash(
            &meta.spec_sha,
            &meta.prompt_sha,
            &hash::impl_hash(&impl_bytes),
        );
        if recomputed != chk_sha {
            return Err(Error::Integrity(IntegrityError::HashMismatch {
                unit_id: unit_id.to_string(),
                active: chk_sha.to_string(),
                current: recomputed,
            }));
        }
        Ok(())
    }

    fn bind(&self, store: &crate::store::Store, unit_id: &str, chk_sha: &str) -> LoadedArtifact {
        let key = (unit_id.to_string(), chk_sha.to_string());
        let mut loaded = self.loaded.lock().expect("loader cache lock");
        loaded
            .entry(key)
            .or_insert_with(|| LoadedArtifact {
                unit_id: unit_id.to_string(),
                chk_sha: chk_sha.to_string(),
                impl_path: store.impl_path(unit_id, chk_sha),
            })
            .clone()
    }
}
