//! Canonical digests for specs, prompts, artifacts, and checkpoints.
//!
//! Every digest is SHA-256 over tagged, length-prefixed fields so field
//! concatenation is unambiguous: a field contributes `tag ":" len_be64 bytes`
//! and no arrangement of neighbouring fields can collide with another.

use crate::config::ProviderConfig;
use crate::unit::{DependencyRef, Spec};
use sha2::{Digest, Sha256};

/// Schema version bound to the hash input layout; changing the enumerated
/// inputs requires bumping this constant.
pub const SPEC_SCHEMA_VERSION: &str = "vibesafe-spec-v1";

fn update_field(hasher: &mut Sha256, tag: &str, bytes: &[u8]) {
    hasher.update(tag.as_bytes());
    hasher.update(b":");
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Canonical decimal text for the deterministic provider parameters.
///
/// `f64` uses Rust's shortest round-trip formatting, so `0.0` renders as `0`
/// and the text is stable across platforms.
fn canonical_f64(value: f64) -> String {
    format!("{value}")
}

/// Compute `H_spec` for a spec under a resolved provider and template.
pub fn spec_hash(spec: &Spec, template_id: &str, provider: &ProviderConfig) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, "schema", SPEC_SCHEMA_VERSION.as_bytes());
    update_field(
        &mut hasher,
        "signature",
        spec.signature.canonical_text().as_bytes(),
    );
    update_field(&mut hasher, "docstring", spec.docstring.as_bytes());
    update_field(&mut hasher, "pre_hole", spec.pre_hole_source.as_bytes());
    update_field(&mut hasher, "template", template_id.as_bytes());
    update_field(&mut hasher, "provider", provider.identity().as_bytes());
    update_field(&mut hasher, "seed", provider.seed.to_string().as_bytes());
    update_field(
        &mut hasher,
        "temperature",
        canonical_f64(provider.temperature).as_bytes(),
    );
    if let Some(max_tokens) = provider.max_tokens {
        update_field(&mut hasher, "max_tokens", max_tokens.to_string().as_bytes());
    }
    update_field(
        &mut hasher,
        "deps",
        dependency_digest(&spec.dependency_refs).as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

/// Deterministic digest over the sorted dependency references; empty input
/// digests to the empty string.
pub fn dependency_digest(refs: &[DependencyRef]) -> String {
    if refs.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&DependencyRef> = refs.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let mut hasher = Sha256::new();
    for dep in sorted {
        update_field(&mut hasher, "name", dep.name.as_bytes());
        update_field(&mut hasher, "path", dep.resolved_path.as_bytes());
        update_field(&mut hasher, "hash", dep.content_hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// `H_prompt`: digest of the rendered prompt bytes.
pub fn prompt_hash(rendered: &str) -> String {
    crate::util::sha256_hex(rendered.as_bytes())
}

/// `H_impl`: digest of the validated artifact bytes.
pub fn impl_hash(artifact: &[u8]) -> String {
    crate::util::sha256_hex(artifact)
}

/// `H_chk`: digest over `(H_spec, H_prompt, H_impl)`.
pub fn checkpoint_hash(spec_hash: &str, prompt_hash: &str, impl_hash: &str) -> String {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, "spec", spec_hash.as_bytes());
    update_field(&mut hasher, "prompt", prompt_hash.as_bytes());
    update_field(&mut hasher, "impl", impl_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}
