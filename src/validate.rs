//! Structural and semantic checks on generated code.
//!
//! Checks run in a fixed order and fail fast; nothing reaches the checkpoint
//! store until every check passes.

use crate::error::{ValidationError, ValidationKind};
use crate::introspect::Introspector;
use crate::unit::Spec;
use regex::Regex;
use std::sync::OnceLock;

/// Maximum accepted artifact size in bytes.
pub const MAX_ARTIFACT_BYTES: usize = 256 * 1024;

/// Validator configuration beyond the spec itself.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// Substrings whose presence fails the artifact; empty by default.
    pub deny_list: Vec<String>,
    /// Import names accepted even when the introspector cannot resolve them.
    pub import_allow: Vec<String>,
}

impl Validator {
    /// Run every check in order against a candidate artifact.
    pub fn validate(
        &self,
        spec: &Spec,
        artifact: &str,
        introspector: &dyn Introspector,
    ) -> Result<(), ValidationError> {
        self.check_parses(spec, artifact, introspector)?;
        self.check_symbol_present(spec, artifact)?;
        self.check_signature(spec, artifact)?;
        self.check_deny_list(spec, artifact)?;
        self.check_imports(spec, artifact, introspector)?;
        self.check_size(spec, artifact)?;
        Ok(())
    }

    fn check_size(&self, spec: &Spec, artifact: &str) -> Result<(), ValidationError> {
        if artifact.len() > MAX_ARTIFACT_BYTES {
            return Err(ValidationError {
                kind: ValidationKind::Oversized,
                location: spec.unit_id.clone(),
                detail: format!(
                    "artifact is {} bytes, limit is {MAX_ARTIFACT_BYTES}",
                    artifact.len()
                ),
            });
        }
        Ok(())
    }

    fn check_parses(
        &self,
        spec: &Spec,
        artifact: &str,
        introspector: &dyn Introspector,
    ) -> Result<(), ValidationError> {
        introspector
            .parse_source(artifact)
            .map_err(|detail| ValidationError {
                kind: ValidationKind::Parse,
                location: spec.unit_id.clone(),
                detail,
            })
    }

    fn check_symbol_present(&self, spec: &Spec, artifact: &str) -> Result<(), ValidationError> {
        if find_definition_header(artifact, spec.unit_name()).is_some() {
            return Ok(());
        }
        Err(ValidationError {
            kind: ValidationKind::MissingSymbol,
            location: spec.unit_id.clone(),
            detail: format!(
                "no top-level definition of {:?} in the artifact",
                spec.unit_name()
            ),
        })
    }

    fn check_signature(&self, spec: &Spec, artifact: &str) -> Result<(), ValidationError> {
        let Some(header) = find_definition_header(artifact, spec.unit_name()) else {
            return Ok(()); // symbol check already rejected this case
        };
        let expected = spec.signature.canonical_text();
        let actual = match crate::spec::extract::canonical_header(&header) {
            Some(actual) => actual,
            None => {
                return Err(ValidationError {
                    kind: ValidationKind::SignatureMismatch,
                    location: spec.unit_id.clone(),
                    detail: format!("could not read the signature from {header:?}"),
                })
            }
        };
        if actual != expected {
            return Err(ValidationError {
                kind: ValidationKind::SignatureMismatch,
                location: spec.unit_id.clone(),
                detail: format!("expected `{expected}`, artifact has `{actual}`"),
            });
        }
        Ok(())
    }

    fn check_deny_list(&self, spec: &Spec, artifact: &str) -> Result<(), ValidationError> {
        for needle in &self.deny_list {
            if artifact.contains(needle.as_str()) {
                return Err(ValidationError {
                    kind: ValidationKind::ForbiddenConstruct,
                    location: spec.unit_id.clone(),
                    detail: format!("artifact contains forbidden construct {needle:?}"),
                });
            }
        }
        Ok(())
    }

    fn check_imports(
        &self,
        spec: &Spec,
        artifact: &str,
        introspector: &dyn Introspector,
    ) -> Result<(), ValidationError> {
        for module in top_level_imports(artifact) {
            if self.import_allow.iter().any(|allowed| *allowed == module) {
                continue;
            }
            if !introspector.resolve_import(&module) {
                return Err(ValidationError {
                    kind: ValidationKind::UnresolvedImport,
                    location: spec.unit_id.clone(),
                    detail: format!("import {module:?} does not resolve"),
                });
            }
        }
        Ok(())
    }
}

/// Find the (possibly multi-line) `def` header for `name` at column zero.
fn find_definition_header(artifact: &str, name: &str) -> Option<String> {
    let lines: Vec<&str> = artifact.split('\n').collect();
    for (idx, line) in lines.iter().enumerate() {
        let is_def = line.starts_with(&format!("def {name}"))
            || line.starts_with(&format!("async def {name}"))
            || line.starts_with(&format!("class {name}"));
        if !is_def {
            continue;
        }
        // Reassemble until the header's colon closes at depth zero.
        let mut header = String::new();
        let mut depth = 0i32;
        for part in &lines[idx..] {
            if !header.is_empty() {
                header.push('\n');
            }
            header.push_str(part);
            depth += part.chars().fold(0, |acc, ch| match ch {
                '(' | '[' | '{' => acc + 1,
                ')' | ']' | '}' => acc - 1,
                _ => acc,
            });
            if depth <= 0 && part.trim_end().ends_with(':') {
                return Some(header);
            }
        }
        return Some(header);
    }
    None
}

/// Modules named by top-level `import` / `from ... import` statements.
fn top_level_imports(artifact: &str) -> Vec<String> {
    static IMPORT: OnceLock<Regex> = OnceLock::new();
    static FROM: OnceLock<Regex> = OnceLock::new();
    let import = IMPORT.get_or_init(|| {
        Regex::new(r"^import\s+([A-Za-z_][A-Za-z0-9_.]*)").expect("import regex")
    });
    let from = FROM.get_or_init(|| {
        Regex::new(r"^from\s+([A-Za-z_][A-Za-z0-9_.]*)\s+import\b").expect("from-import regex")
    });

    let mut modules = Vec::new();
    for line in artifact.lines() {
        if let Some(cap) = import.captures(line) {
            modules.push(cap[1].to_string());
            // `import a, b` carries extra names after the first.
            if let Some((_, rest)) = line.split_once(',') {
                for extra in rest.split(',') {
                    let extra = extra.trim().split_whitespace().next().unwrap_or("");
                    if !extra.is_empty() {
                        modules.push(extra.to_string());
                    }
                }
            }
        } else if let Some(cap) = from.captures(line) {
            modules.push(cap[1].to_string());
        }
    }
    modules
}
