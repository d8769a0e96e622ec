//! Data model for units, specs, and examples.
//!
//! A `Spec` is the canonical, immutable extraction of one decorated stub; it
//! is rebuilt from source on every scan and never persisted.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Kind of a decorated unit, selecting the pipeline and default template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Function,
    Http,
    Cli,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Function => "function",
            UnitKind::Http => "http",
            UnitKind::Cli => "cli",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One function parameter as written in the stub, annotation normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub type_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_text: Option<String>,
}

/// Canonical signature: ordered parameters plus the return annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type_text: String,
    pub is_async: bool,
}

impl Signature {
    /// Canonical text used for hashing and byte-exact validator comparison.
    pub fn canonical_text(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|param| {
                let mut text = format!("{}: {}", param.name, param.type_text);
                if let Some(default) = &param.default_text {
                    text.push_str(&format!(" = {default}"));
                }
                text
            })
            .collect::<Vec<_>>()
            .join(", ");
        let prefix = if self.is_async { "async def" } else { "def" };
        format!(
            "{prefix} {}({params}) -> {}",
            self.name, self.return_type_text
        )
    }
}

/// One doctest example: an input expression and its expected output block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Example {
    /// Expression text, continuation lines joined with newlines.
    pub input_source: String,
    /// Expected output, whitespace significant, ending in one LF.
    pub expected_output: String,
}

impl Example {
    /// Whether the expected block opts in to ellipsis matching.
    pub fn uses_ellipsis(&self) -> bool {
        self.expected_output.contains("...")
    }
}

/// Per-unit decorator overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// HTTP method, http units only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// URL path, http units only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

/// One external name referenced by the pre-hole slice.
///
/// Unresolvable names keep the `"unresolved"` tombstone in both fields so the
/// dependency digest stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRef {
    pub name: String,
    pub resolved_path: String,
    pub content_hash: String,
}

impl DependencyRef {
    pub const TOMBSTONE: &'static str = "unresolved";

    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved_path: Self::TOMBSTONE.to_string(),
            content_hash: Self::TOMBSTONE.to_string(),
        }
    }
}

/// Where a unit was read from, sufficient to re-read the source slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    /// 1-based line of the first decorator.
    pub line: usize,
}

/// Canonical, immutable extraction of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct Spec {
    pub unit_id: String,
    pub kind: UnitKind,
    pub location: SourceLocation,
    pub signature: Signature,
    /// Docstring after normalisation (LF newlines, common indent stripped).
    pub docstring: String,
    pub examples: Vec<Example>,
    /// Fenced ```hypothesis blocks, verbatim.
    pub hypothesis_blocks: Vec<String>,
    /// Body text before the sentinel, common indent stripped.
    pub pre_hole_source: String,
    pub provider_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_ref: Option<String>,
    pub options: UnitOptions,
    pub dependency_refs: Vec<DependencyRef>,
}

impl Spec {
    /// Module path portion of the unit id (`app.math.ops` in
    /// `app.math.ops/add_strs`).
    pub fn module_path(&self) -> &str {
        self.unit_id.split('/').next().unwrap_or("")
    }

    /// Unit name portion of the unit id.
    pub fn unit_name(&self) -> &str {
        self.unit_id.rsplit('/').next().unwrap_or(&self.unit_id)
    }
}

/// Split a unit id into module path and name.
pub fn split_unit_id(unit_id: &str) -> Option<(&str, &str)> {
    unit_id.split_once('/')
}

/// Pipeline status of a unit as reported by `scan` and `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Uncompiled,
    CompiledActive,
    Drifted,
    MissingExamples,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Uncompiled => "uncompiled",
            UnitStatus::CompiledActive => "compiled_active",
            UnitStatus::Drifted => "drifted",
            UnitStatus::MissingExamples => "missing_examples",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
