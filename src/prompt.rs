//! Deterministic prompt rendering.
//!
//! A rendered prompt is purely a function of the spec and the template text:
//! templates get a single structured context record and have no access to the
//! clock, the environment, or the filesystem.

use crate::config::Config;
use crate::error::TemplateError;
use crate::unit::{Spec, UnitKind};
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

pub const FUNCTION_TEMPLATE: &str = include_str!("../prompts/function.j2");
pub const HTTP_TEMPLATE: &str = include_str!("../prompts/http_endpoint.j2");
pub const CLI_TEMPLATE: &str = include_str!("../prompts/cli_command.j2");

/// Resolve the template identifier for a unit: an explicit decorator override
/// wins, otherwise the configured default for the unit's kind.
pub fn resolve_template_id(spec: &Spec, config: &Config) -> String {
    match &spec.template_ref {
        Some(explicit) => explicit.clone(),
        None => config.template_for_kind(spec.kind).to_string(),
    }
}

/// Embedded fallback for the three built-in template names.
fn builtin_template(template_id: &str) -> Option<&'static str> {
    match template_id {
        "prompts/function.j2" => Some(FUNCTION_TEMPLATE),
        "prompts/http_endpoint.j2" => Some(HTTP_TEMPLATE),
        "prompts/cli_command.j2" => Some(CLI_TEMPLATE),
        _ => None,
    }
}

/// Load template text: an existing file under the project root wins, the
/// built-in names fall back to the embedded copies.
fn load_template(template_id: &str, root: &Path) -> Result<String, TemplateError> {
    let candidate = if Path::new(template_id).is_absolute() {
        Path::new(template_id).to_path_buf()
    } else {
        root.join(template_id)
    };
    if candidate.exists() {
        return fs::read_to_string(&candidate).map_err(|err| TemplateError::NotFound {
            template: format!("{template_id} ({err})"),
        });
    }
    builtin_template(template_id)
        .map(|text| text.to_string())
        .ok_or_else(|| TemplateError::NotFound {
            template: template_id.to_string(),
        })
}

/// Build the canonical render context for a spec.
fn render_context(spec: &Spec, template_id: &str) -> Context {
    let mut context = Context::new();
    context.insert("unit_id", &spec.unit_id);
    context.insert("kind", spec.kind.as_str());
    context.insert("template_id", template_id);
    context.insert("signature", &spec.signature.canonical_text());
    context.insert("params", &spec.signature.params);
    context.insert("return_type", &spec.signature.return_type_text);
    context.insert("is_async", &spec.signature.is_async);
    context.insert("docstring", &spec.docstring);
    context.insert("examples", &spec.examples);
    context.insert("pre_hole", &spec.pre_hole_source);
    context.insert("dependencies", &spec.dependency_refs);
    context.insert("tool_version", env!("CARGO_PKG_VERSION"));
    if spec.kind == UnitKind::Http {
        context.insert("method", spec.options.method.as_deref().unwrap_or("GET"));
        context.insert("path", spec.options.path.as_deref().unwrap_or("/"));
        context.insert("tags", &spec.options.tags);
    }
    context
}

/// Render the prompt for a spec under a resolved template id.
pub fn render(spec: &Spec, template_id: &str, config: &Config) -> Result<String, TemplateError> {
    let template_text = load_template(template_id, &config.root)?;
    let mut tera = Tera::default();
    tera.add_raw_template(template_id, &template_text)
        .map_err(|err| TemplateError::Render {
            template: template_id.to_string(),
            detail: err.to_string(),
        })?;
    tera.render(template_id, &render_context(spec, template_id))
        .map_err(|err| TemplateError::Render {
            template: template_id.to_string(),
            detail: render_error_detail(&err),
        })
}

/// Flatten tera's error chain so line offsets survive into the message.
fn render_error_detail(err: &tera::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        detail.push_str(": ");
        detail.push_str(&inner.to_string());
        source = std::error::Error::source(inner);
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Example, Param, Signature, SourceLocation, UnitOptions};
    use std::path::PathBuf;

    fn sample_spec(kind: UnitKind) -> Spec {
        Spec {
            unit_id: "app.math.ops/add_strs".to_string(),
            kind,
            location: SourceLocation {
                file: PathBuf::from("app/math/ops.py"),
                line: 1,
            },
            signature: Signature {
                name: "add_strs".to_string(),
                params: vec![Param {
                    name: "a".to_string(),
                    type_text: "str".to_string(),
                    default_text: None,
                }],
                return_type_text: "str".to_string(),
                is_async: kind == UnitKind::Http,
            },
            docstring: "Add strings.".to_string(),
            examples: vec![Example {
                input_source: "add_strs(\"2\")".to_string(),
                expected_output: "'2'\n".to_string(),
            }],
            hypothesis_blocks: Vec::new(),
            pre_hole_source: "a_int = int(a)".to_string(),
            provider_ref: "default".to_string(),
            template_ref: None,
            options: UnitOptions {
                method: Some("POST".to_string()),
                path: Some("/sum".to_string()),
                ..UnitOptions::default()
            },
            dependency_refs: Vec::new(),
        }
    }

    fn config() -> Config {
        Config {
            root: PathBuf::from("/nonexistent-project-root"),
            file: crate::config::ConfigFile::default(),
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let spec = sample_spec(UnitKind::Function);
        let config = config();
        let first = render(&spec, "prompts/function.j2", &config).expect("render");
        let second = render(&spec, "prompts/function.j2", &config).expect("render");
        assert_eq!(first, second);
        assert!(first.contains("def add_strs(a: str) -> str"));
        assert!(first.contains(">>> add_strs(\"2\")"));
        assert!(first.contains("a_int = int(a)"));
    }

    #[test]
    fn explicit_template_ref_wins_over_kind_default() {
        let mut spec = sample_spec(UnitKind::Function);
        spec.template_ref = Some("prompts/cli_command.j2".to_string());
        assert_eq!(
            resolve_template_id(&spec, &config()),
            "prompts/cli_command.j2"
        );
        spec.template_ref = None;
        assert_eq!(resolve_template_id(&spec, &config()), "prompts/function.j2");
    }

    #[test]
    fn http_context_carries_route_options() {
        let spec = sample_spec(UnitKind::Http);
        let rendered = render(&spec, "prompts/http_endpoint.j2", &config()).expect("render");
        assert!(rendered.contains("POST /sum"));
        assert!(rendered.contains("async "));
    }

    #[test]
    fn unknown_template_is_a_not_found_error() {
        let spec = sample_spec(UnitKind::Function);
        let err = render(&spec, "prompts/missing.j2", &config()).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { .. }));
    }

    #[test]
    fn on_disk_template_overrides_builtin() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("prompts")).expect("mkdir");
        std::fs::write(
            dir.path().join("prompts/function.j2"),
            "custom for {{ unit_id }}",
        )
        .expect("write template");
        let config = Config {
            root: dir.path().to_path_buf(),
            file: crate::config::ConfigFile::default(),
        };
        let rendered =
            render(&sample_spec(UnitKind::Function), "prompts/function.j2", &config).expect("render");
        assert_eq!(rendered, "custom for app.math.ops/add_strs");
    }
}
