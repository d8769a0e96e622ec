//! The compile verb: Extract -> Hash -> Prompt -> Provider -> Validate ->
//! Store.write.
//!
//! Compile never touches the index; activation is `save`'s job. Within a
//! unit the stages run strictly in order; across units the worker pool fans
//! out bounded parallelism.

use super::pool::{run_parallel, CancelToken};
use super::Pipeline;
use crate::config::RunMode;
use crate::error::{Error, Result, SpecError};
use crate::hash;
use crate::prompt;
use crate::provider::{clean_generated_code, ProviderParams};
use crate::store::{CheckpointMeta, HashInputs};
use crate::unit::Spec;
use crate::util::{now_epoch_ms, sha256_hex, short_hash};
use std::path::PathBuf;

/// Result of compiling one unit.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub unit_id: String,
    pub spec_sha: String,
    pub prompt_sha: String,
    pub chk_sha: String,
    pub checkpoint_dir: PathBuf,
}

/// Compile one unit end to end.
///
/// `force` bypasses the provider cache read. A unit without examples is
/// refused in prod and compiled with a warning in dev.
pub fn compile_unit(pipeline: &Pipeline<'_>, spec: &Spec, force: bool) -> Result<CompileOutcome> {
    if spec.examples.is_empty() {
        match pipeline.config.mode()? {
            RunMode::Prod => {
                return Err(Error::Spec(SpecError::MissingDoctest {
                    unit_id: spec.unit_id.clone(),
                }))
            }
            RunMode::Dev => {
                eprintln!(
                    "warning: {} has no doctest examples; compiling anyway (dev)",
                    spec.unit_id
                );
            }
        }
    }

    let template_id = prompt::resolve_template_id(spec, pipeline.config);
    let (provider_config, provider) = pipeline.provider_for(&spec.provider_ref)?;
    let spec_sha = hash::spec_hash(spec, &template_id, &provider_config);

    let rendered = prompt::render(spec, &template_id, pipeline.config)?;
    let prompt_sha = hash::prompt_hash(&rendered);

    let params = ProviderParams::from_config(&provider_config);
    let completion = provider.complete_cached(&rendered, &prompt_sha, &params, force)?;
    let artifact = clean_generated_code(&completion);

    pipeline
        .validator
        .validate(spec, &artifact, pipeline.introspector)?;

    let impl_sha = hash::impl_hash(artifact.as_bytes());
    let chk_sha = hash::checkpoint_hash(&spec_sha, &prompt_sha, &impl_sha);

    let meta = CheckpointMeta {
        spec_sha: spec_sha.clone(),
        chk_sha: chk_sha.clone(),
        prompt_sha: prompt_sha.clone(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        provider: provider_config.identity(),
        prompt_template: template_id.clone(),
        seed: provider_config.seed,
        temperature: provider_config.temperature,
        max_tokens: provider_config.max_tokens,
        timestamp: now_epoch_ms(),
        hash_inputs: HashInputs {
            signature_sha: sha256_hex(spec.signature.canonical_text().as_bytes()),
            docstring_sha: sha256_hex(spec.docstring.as_bytes()),
            pre_hole_sha: sha256_hex(spec.pre_hole_source.as_bytes()),
            dependency_digest: hash::dependency_digest(&spec.dependency_refs),
            template_id,
            provider_model: provider_config.model.clone(),
        },
        deps: None,
    };

    let checkpoint_dir = pipeline
        .store()
        .write(&spec.unit_id, &chk_sha, artifact.as_bytes(), &meta)?;

    Ok(CompileOutcome {
        unit_id: spec.unit_id.clone(),
        spec_sha,
        prompt_sha,
        chk_sha,
        checkpoint_dir,
    })
}

/// Compile a batch of units with bounded parallelism, reporting results in
/// unit order.
pub fn compile_many(
    pipeline: &Pipeline<'_>,
    specs: &[Spec],
    force: bool,
    workers: usize,
    cancel: &CancelToken,
) -> Vec<(String, Result<CompileOutcome>)> {
    let results = run_parallel(specs, workers, cancel, |spec| {
        compile_unit(pipeline, spec, force)
    });
    specs
        .iter()
        .zip(results)
        .map(|(spec, result)| {
            let result = result.unwrap_or_else(|| {
                Err(Error::NoCheckpoint {
                    unit_id: spec.unit_id.clone(),
                })
            });
            (spec.unit_id.clone(), result)
        })
        .collect()
}

/// Print one compile result line per unit, returning whether any failed.
pub fn report_compile_results(results: &[(String, Result<CompileOutcome>)]) -> bool {
    let mut failed = false;
    for (unit_id, result) in results {
        match result {
            Ok(outcome) => {
                println!(
                    "{unit_id}: checkpoint {} (spec {})",
                    short_hash(&outcome.chk_sha),
                    short_hash(&outcome.spec_sha)
                );
            }
            Err(err) => {
                failed = true;
                println!("{unit_id}: FAILED: {err}");
                if let Some(hint) = err.remediation() {
                    println!("  hint: {hint}");
                }
            }
        }
    }
    failed
}
