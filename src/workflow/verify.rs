//! The test and save verbs, plus dependency freezing.
//!
//! `test` runs the harness against the latest candidate checkpoint (or the
//! active one when nothing newer exists); `save` re-verifies and then
//! activates. Activation is refused while any gate fails or the unit has no
//! examples.

use super::Pipeline;
use crate::error::{Error, GateFailure, Result, SpecError};
use crate::exec::{run_limited, ExecLimits};
use crate::harness::HarnessReport;
use crate::store::Store;
use crate::unit::Spec;
use crate::util::short_hash;
use std::collections::BTreeMap;
use std::time::Duration;

/// Pick the checkpoint the harness should judge: the newest candidate,
/// falling back to the active one.
fn candidate_checkpoint(store: &Store, unit_id: &str) -> Result<Option<String>> {
    let checkpoints = store.list_checkpoints(unit_id);
    if let Some((newest, _)) = checkpoints.first() {
        return Ok(Some(newest.clone()));
    }
    Ok(store.index().active(unit_id)?)
}

/// Run all gates for a unit without touching the index.
pub fn test_unit(pipeline: &Pipeline<'_>, spec: &Spec) -> Result<HarnessReport> {
    let store = pipeline.store();
    let chk_sha = candidate_checkpoint(&store, &spec.unit_id)?.ok_or(Error::NoCheckpoint {
        unit_id: spec.unit_id.clone(),
    })?;
    let impl_path = store.impl_path(&spec.unit_id, &chk_sha);
    Ok(pipeline.harness().verify(spec, &impl_path))
}

/// Verify and activate a unit's newest checkpoint.
///
/// Returns the activated checkpoint hash. Fails with the first gate failure
/// or `MissingDoctest` when the unit declares no examples.
pub fn save_unit(pipeline: &Pipeline<'_>, spec: &Spec) -> Result<String> {
    if spec.examples.is_empty() {
        return Err(Error::Spec(SpecError::MissingDoctest {
            unit_id: spec.unit_id.clone(),
        }));
    }

    let store = pipeline.store();
    let chk_sha = candidate_checkpoint(&store, &spec.unit_id)?.ok_or(Error::NoCheckpoint {
        unit_id: spec.unit_id.clone(),
    })?;
    let impl_path = store.impl_path(&spec.unit_id, &chk_sha);
    let report = pipeline.harness().verify(spec, &impl_path);

    if let Some(failure) = report.failures().first() {
        return Err(Error::Gate(GateFailure {
            unit_id: spec.unit_id.clone(),
            category: failure.gate,
            detail: failure.detail.clone(),
        }));
    }

    store.index().activate(&spec.unit_id, &chk_sha)?;
    println!(
        "{}: activated checkpoint {}",
        spec.unit_id,
        short_hash(&chk_sha)
    );
    Ok(chk_sha)
}

/// Modules whose versions are pinned by `save --freeze-http-deps`.
const FREEZE_PACKAGES: &[&str] = &["fastapi", "starlette", "pydantic", "httpx"];

/// Record interpreter dependency pins into the active checkpoints' metadata.
pub fn freeze_http_deps(pipeline: &Pipeline<'_>, specs: &[Spec]) -> Result<()> {
    let result = run_limited(
        "python3",
        &[
            "-m".to_string(),
            "pip".to_string(),
            "freeze".to_string(),
        ],
        None,
        None,
        ExecLimits::timeout_only(Duration::from_secs(60)),
    );
    let listing = match result {
        Ok(result) if result.success() => result.stdout_text(),
        Ok(result) => {
            eprintln!(
                "warning: pip freeze failed, skipping dependency pins: {}",
                result.stderr_text().trim()
            );
            return Ok(());
        }
        Err(err) => {
            eprintln!("warning: pip freeze unavailable, skipping dependency pins: {err}");
            return Ok(());
        }
    };

    let mut pins: BTreeMap<String, String> = BTreeMap::new();
    for line in listing.lines() {
        let Some((name, version)) = line.split_once("==") else {
            continue;
        };
        if FREEZE_PACKAGES.contains(&name.to_lowercase().as_str()) {
            pins.insert(name.to_string(), version.trim().to_string());
        }
    }
    if pins.is_empty() {
        eprintln!("warning: none of the freeze packages are installed; nothing to pin");
        return Ok(());
    }

    let store = pipeline.store();
    let index = store.index();
    for spec in specs {
        let Some(chk_sha) = index.active(&spec.unit_id)? else {
            continue;
        };
        let mut meta = store.read_meta(&spec.unit_id, &chk_sha)?;
        meta.deps = Some(pins.clone());
        store.update_meta(&spec.unit_id, &chk_sha, &meta)?;
        println!("{}: recorded {} dependency pins", spec.unit_id, pins.len());
    }
    Ok(())
}
