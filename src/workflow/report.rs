//! Read-only verbs: scan, status, diff, check.

use super::verify::test_unit;
use super::Pipeline;
use crate::error::Result;
use crate::hash;
use crate::prompt;
use crate::unit::{Spec, UnitStatus};
use crate::util::short_hash;

/// Per-unit snapshot used by `scan` and `status`.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit_id: String,
    pub kind: &'static str,
    pub example_count: usize,
    pub current_spec_sha: String,
    pub active_chk_sha: Option<String>,
    pub active_spec_sha: Option<String>,
    pub status: UnitStatus,
}

/// Compute the pipeline status of one unit against the store and index.
pub fn unit_status(pipeline: &Pipeline<'_>, spec: &Spec) -> Result<UnitReport> {
    let template_id = prompt::resolve_template_id(spec, pipeline.config);
    let provider_config = pipeline.config.provider(&spec.provider_ref);
    let current_spec_sha = hash::spec_hash(spec, &template_id, &provider_config);

    let store = pipeline.store();
    let active_chk_sha = store.index().active(&spec.unit_id)?;
    let active_spec_sha = match &active_chk_sha {
        Some(chk_sha) => store
            .read_meta(&spec.unit_id, chk_sha)
            .ok()
            .map(|meta| meta.spec_sha),
        None => None,
    };

    let status = if spec.examples.is_empty() {
        UnitStatus::MissingExamples
    } else if active_chk_sha.is_none() {
        UnitStatus::Uncompiled
    } else if active_spec_sha.as_deref() == Some(current_spec_sha.as_str()) {
        UnitStatus::CompiledActive
    } else {
        UnitStatus::Drifted
    };

    Ok(UnitReport {
        unit_id: spec.unit_id.clone(),
        kind: spec.kind.as_str(),
        example_count: spec.examples.len(),
        current_spec_sha,
        active_chk_sha,
        active_spec_sha,
        status,
    })
}

/// List units with kind, example count, and status.
pub fn run_scan(pipeline: &Pipeline<'_>, specs: &[Spec]) -> Result<()> {
    if specs.is_empty() {
        println!("no vibesafe units found");
        return Ok(());
    }
    let width = specs
        .iter()
        .map(|spec| spec.unit_id.len())
        .max()
        .unwrap_or(0)
        .max("unit".len());
    println!("{:<width$}  {:<8}  {:>8}  status", "unit", "kind", "examples");
    for spec in specs {
        let report = unit_status(pipeline, spec)?;
        println!(
            "{:<width$}  {:<8}  {:>8}  {}",
            report.unit_id, report.kind, report.example_count, report.status
        );
    }
    println!("\ntotal units: {}", specs.len());
    Ok(())
}

/// Summarise coverage and drift across all units.
pub fn run_status(pipeline: &Pipeline<'_>, specs: &[Spec]) -> Result<()> {
    if specs.is_empty() {
        println!("no vibesafe units found");
        return Ok(());
    }
    let width = specs
        .iter()
        .map(|spec| spec.unit_id.len())
        .max()
        .unwrap_or(0)
        .max("unit".len());
    println!(
        "{:<width$}  {:<10}  {:<10}  status",
        "unit", "active", "current"
    );
    let mut drifted = 0usize;
    let mut active = 0usize;
    for spec in specs {
        let report = unit_status(pipeline, spec)?;
        if report.status == UnitStatus::Drifted {
            drifted += 1;
        }
        if report.active_chk_sha.is_some() {
            active += 1;
        }
        println!(
            "{:<width$}  {:<10}  {:<10}  {}",
            report.unit_id,
            report
                .active_chk_sha
                .as_deref()
                .map(short_hash)
                .unwrap_or("-"),
            short_hash(&report.current_spec_sha),
            report.status
        );
    }
    println!(
        "\nunits: {}  active: {active}  drift: {drifted}",
        specs.len()
    );
    Ok(())
}

/// Show spec/prompt deltas between current source and active checkpoints.
///
/// Returns whether any drift was found.
pub fn run_diff(pipeline: &Pipeline<'_>, specs: &[Spec]) -> Result<bool> {
    let store = pipeline.store();
    let mut drift_found = false;
    for spec in specs {
        let report = unit_status(pipeline, spec)?;
        let Some(chk_sha) = &report.active_chk_sha else {
            println!("{}: no active checkpoint", spec.unit_id);
            continue;
        };
        if report.status != UnitStatus::Drifted {
            println!("{}: in sync ({})", spec.unit_id, short_hash(chk_sha));
            continue;
        }
        drift_found = true;
        let meta = store.read_meta(&spec.unit_id, chk_sha)?;
        let template_id = prompt::resolve_template_id(spec, pipeline.config);
        let current_prompt_sha = prompt::render(spec, &template_id, pipeline.config)
            .map(|rendered| hash::prompt_hash(&rendered))
            .unwrap_or_default();
        println!("{}: drift detected", spec.unit_id);
        println!("  active spec:    {}", meta.spec_sha);
        println!("  current spec:   {}", report.current_spec_sha);
        println!("  active prompt:  {}", meta.prompt_sha);
        println!("  current prompt: {current_prompt_sha}");
        println!(
            "  checkpoint:     {}",
            store.checkpoint_dir(&spec.unit_id, chk_sha).display()
        );
    }
    if !drift_found {
        println!("no drift detected");
    }
    Ok(drift_found)
}

/// Run examples, lint, type, and drift detection across all units.
///
/// Returns whether every check passed.
pub fn run_check(pipeline: &Pipeline<'_>, specs: &[Spec]) -> Result<bool> {
    let mut ok = true;

    println!("running gates...");
    for spec in specs {
        let report = unit_status(pipeline, spec)?;
        if report.active_chk_sha.is_none() {
            println!("{}: SKIP (no active checkpoint)", spec.unit_id);
            continue;
        }
        match test_unit(pipeline, spec) {
            Ok(harness_report) if harness_report.passed() => {
                println!(
                    "{}: ok ({} examples)",
                    spec.unit_id, harness_report.example_count
                );
            }
            Ok(harness_report) => {
                ok = false;
                for failure in harness_report.failures() {
                    println!(
                        "{}: gate {} failed: {}",
                        spec.unit_id,
                        failure.gate.as_str(),
                        failure.detail
                    );
                }
            }
            Err(err) => {
                ok = false;
                println!("{}: {err}", spec.unit_id);
            }
        }
    }

    println!("checking drift...");
    let mut drifted = 0usize;
    for spec in specs {
        let report = unit_status(pipeline, spec)?;
        if report.status == UnitStatus::Drifted {
            drifted += 1;
            println!("{}: drifted", spec.unit_id);
        }
    }
    if drifted > 0 {
        ok = false;
    } else {
        println!("no drift detected");
    }

    Ok(ok)
}
