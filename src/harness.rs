//! Verification harness: decides whether a validated checkpoint earns
//! activation.
//!
//! Three gates always run (examples, lint, type) plus a property gate when
//! the docstring carries hypothesis blocks. Gates execute external tools
//! under a per-gate timeout; with the sandbox enabled, children also get a
//! memory cap. The harness only reports results; activation is the
//! orchestrator's call.

use crate::config::{Config, SandboxConfig};
use crate::error::GateCategory;
use crate::exec::{run_limited, ExecLimits};
use crate::introspect::Introspector;
use crate::spec::doctest::output_matches;
use crate::unit::Spec;
use crate::util::truncate_string;
use std::path::Path;
use std::time::Duration;

/// Gate Tool command for the lint gate.
pub const LINT_COMMAND: &str = "ruff check";
/// Gate Tool command for the type gate.
pub const TYPE_COMMAND: &str = "mypy --no-error-summary";

const MAX_GATE_DETAIL_BYTES: usize = 2000;

/// Result of one gate.
#[derive(Debug, Clone)]
pub struct GateResult {
    pub gate: GateCategory,
    pub passed: bool,
    /// Failure detail or skip notice; empty when the gate passed cleanly.
    pub detail: String,
    /// The gate's tool was unavailable and the gate did not run.
    pub skipped: bool,
}

impl GateResult {
    fn pass(gate: GateCategory) -> Self {
        Self {
            gate,
            passed: true,
            detail: String::new(),
            skipped: false,
        }
    }

    fn fail(gate: GateCategory, detail: String) -> Self {
        Self {
            gate,
            passed: false,
            detail: truncate_string(&detail, MAX_GATE_DETAIL_BYTES),
            skipped: false,
        }
    }

    fn skip(gate: GateCategory, detail: String) -> Self {
        Self {
            gate,
            passed: true,
            detail,
            skipped: true,
        }
    }
}

/// A single absent tool skips its gate with a notice; both tools absent
/// means the quality gates are unavailable and the unit cannot pass.
fn reconcile_missing_tools(lint: GateResult, type_check: GateResult) -> (GateResult, GateResult) {
    if lint.skipped && type_check.skipped {
        let detail = "quality gates unavailable: install the lint and type tools".to_string();
        (
            GateResult::fail(GateCategory::Lint, detail.clone()),
            GateResult::fail(GateCategory::Type, detail),
        )
    } else {
        (lint, type_check)
    }
}

/// Per-unit harness report across all gates.
#[derive(Debug, Clone)]
pub struct HarnessReport {
    pub unit_id: String,
    pub gates: Vec<GateResult>,
    /// Number of examples evaluated by the example gate.
    pub example_count: usize,
}

impl HarnessReport {
    pub fn passed(&self) -> bool {
        self.gates.iter().all(|gate| gate.passed)
    }

    pub fn failures(&self) -> Vec<&GateResult> {
        self.gates.iter().filter(|gate| !gate.passed).collect()
    }
}

/// Runs gates for one candidate artifact.
pub struct Harness<'a> {
    pub config: &'a Config,
    pub introspector: &'a dyn Introspector,
    /// Lint Gate Tool command; split with shell-words, impl path appended.
    pub lint_command: String,
    /// Type Gate Tool command; split with shell-words, impl path appended.
    pub type_command: String,
}

impl<'a> Harness<'a> {
    pub fn new(config: &'a Config, introspector: &'a dyn Introspector) -> Self {
        Self {
            config,
            introspector,
            lint_command: LINT_COMMAND.to_string(),
            type_command: TYPE_COMMAND.to_string(),
        }
    }

    /// Override the Gate Tool commands (used by tests and embedding hosts).
    pub fn with_gate_commands(mut self, lint: &str, type_check: &str) -> Self {
        self.lint_command = lint.to_string();
        self.type_command = type_check.to_string();
        self
    }

    fn limits(&self) -> ExecLimits {
        let sandbox: &SandboxConfig = &self.config.file.sandbox;
        ExecLimits {
            timeout: Duration::from_secs(sandbox.timeout),
            memory_mb: sandbox.enabled.then_some(sandbox.memory_mb),
        }
    }

    /// Run every applicable gate against the artifact at `impl_path`.
    ///
    /// A missing Gate Tool is skipped with a notice rather than failing the
    /// unit, unless both the lint and type tools are absent, in which case
    /// the quality gates are considered unavailable and the unit fails.
    pub fn verify(&self, spec: &Spec, impl_path: &Path) -> HarnessReport {
        let mut gates = Vec::new();
        gates.push(self.example_gate(spec, impl_path));
        let lint = self.tool_gate(GateCategory::Lint, &self.lint_command, impl_path);
        let type_check = self.tool_gate(GateCategory::Type, &self.type_command, impl_path);
        let (lint, type_check) = reconcile_missing_tools(lint, type_check);
        gates.push(lint);
        gates.push(type_check);
        if !spec.hypothesis_blocks.is_empty() {
            gates.push(self.property_gate(spec, impl_path));
        }
        HarnessReport {
            unit_id: spec.unit_id.clone(),
            gates,
            example_count: spec.examples.len(),
        }
    }

    /// Gate 1: every doctest example must reproduce its expected output.
    fn example_gate(&self, spec: &Spec, impl_path: &Path) -> GateResult {
        if spec.examples.is_empty() {
            return GateResult::pass(GateCategory::ExampleMismatch);
        }
        let run = match self
            .introspector
            .run_examples(impl_path, &spec.examples, self.limits())
        {
            Ok(run) => run,
            Err(detail) if detail.contains("timed out") => {
                return GateResult::fail(GateCategory::Timeout, detail)
            }
            Err(detail) => return GateResult::fail(GateCategory::ExampleMismatch, detail),
        };
        if run.outputs.len() != spec.examples.len() {
            return GateResult::fail(
                GateCategory::ExampleMismatch,
                format!(
                    "driver returned {} outputs for {} examples",
                    run.outputs.len(),
                    spec.examples.len()
                ),
            );
        }
        let mut failures = Vec::new();
        for (example, actual) in spec.examples.iter().zip(&run.outputs) {
            if !output_matches(&example.expected_output, actual) {
                failures.push(format!(
                    ">>> {}\nexpected: {:?}\n     got: {:?}",
                    example.input_source, example.expected_output, actual
                ));
            }
        }
        if failures.is_empty() {
            GateResult::pass(GateCategory::ExampleMismatch)
        } else {
            GateResult::fail(GateCategory::ExampleMismatch, failures.join("\n"))
        }
    }

    /// Gates 2 and 3: external lint/type tools, judged by exit status.
    fn tool_gate(&self, gate: GateCategory, command: &str, impl_path: &Path) -> GateResult {
        let mut argv = match shell_words::split(command) {
            Ok(argv) if !argv.is_empty() => argv,
            _ => return GateResult::fail(gate, format!("bad gate command {command:?}")),
        };
        let program = argv.remove(0);
        argv.push(impl_path.display().to_string());

        let result = match run_limited(&program, &argv, None, None, self.limits()) {
            Ok(result) => result,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return GateResult::skip(
                    gate,
                    format!("{program} is not installed; install it to enable this gate"),
                );
            }
            Err(err) => return GateResult::fail(gate, format!("spawn {program}: {err}")),
        };
        if result.timed_out {
            return GateResult::fail(GateCategory::Timeout, format!("{program} timed out"));
        }
        if result.success() {
            GateResult::pass(gate)
        } else {
            let output = if result.stdout.is_empty() {
                result.stderr_text()
            } else {
                result.stdout_text()
            };
            GateResult::fail(gate, output.trim().to_string())
        }
    }

    /// Optional gate: hypothesis blocks run verbatim against the artifact.
    fn property_gate(&self, spec: &Spec, impl_path: &Path) -> GateResult {
        let source = spec.hypothesis_blocks.join("\n\n");
        let result = match self
            .introspector
            .run_properties(impl_path, &source, self.limits())
        {
            Ok(result) => result,
            Err(detail) => return GateResult::fail(GateCategory::Sandbox, detail),
        };
        if result.timed_out {
            return GateResult::fail(GateCategory::Timeout, "property tests timed out".to_string());
        }
        if result.success() {
            GateResult::pass(GateCategory::Property)
        } else {
            GateResult::fail(GateCategory::Property, result.stderr_text().trim().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::exec::ExecResult;
    use crate::introspect::ExampleRun;
    use crate::unit::{Example, Param, Signature, SourceLocation, UnitKind, UnitOptions};
    use std::path::PathBuf;

    /// Introspector stub returning canned example outputs.
    struct CannedIntrospector {
        outputs: Vec<String>,
        error: Option<String>,
    }

    impl Introspector for CannedIntrospector {
        fn parse_source(&self, _source: &str) -> Result<(), String> {
            Ok(())
        }

        fn resolve_symbol(&self, _name: &str) -> Option<(String, String)> {
            None
        }

        fn resolve_import(&self, _module: &str) -> bool {
            true
        }

        fn run_examples(
            &self,
            _impl_path: &Path,
            _examples: &[Example],
            _limits: ExecLimits,
        ) -> Result<ExampleRun, String> {
            match &self.error {
                Some(detail) => Err(detail.clone()),
                None => Ok(ExampleRun {
                    outputs: self.outputs.clone(),
                }),
            }
        }

        fn run_properties(
            &self,
            _impl_path: &Path,
            _source: &str,
            _limits: ExecLimits,
        ) -> Result<ExecResult, String> {
            Err("not used".to_string())
        }
    }

    fn spec_with_example(expected: &str) -> Spec {
        Spec {
            unit_id: "m/f".to_string(),
            kind: UnitKind::Function,
            location: SourceLocation {
                file: PathBuf::from("m.py"),
                line: 1,
            },
            signature: Signature {
                name: "f".to_string(),
                params: vec![Param {
                    name: "a".to_string(),
                    type_text: "str".to_string(),
                    default_text: None,
                }],
                return_type_text: "str".to_string(),
                is_async: false,
            },
            docstring: String::new(),
            examples: vec![Example {
                input_source: "f(\"2\")".to_string(),
                expected_output: expected.to_string(),
            }],
            hypothesis_blocks: Vec::new(),
            pre_hole_source: String::new(),
            provider_ref: "default".to_string(),
            template_ref: None,
            options: UnitOptions::default(),
            dependency_refs: Vec::new(),
        }
    }

    fn config() -> Config {
        Config {
            root: PathBuf::from("/tmp"),
            file: ConfigFile::default(),
        }
    }

    fn example_gate_only(config: &Config, introspector: &dyn Introspector, spec: &Spec) -> GateResult {
        Harness::new(config, introspector).example_gate(spec, Path::new("impl.py"))
    }

    #[test]
    fn byte_exact_outputs_pass_the_example_gate() {
        let config = config();
        let introspector = CannedIntrospector {
            outputs: vec!["'5'\n".to_string()],
            error: None,
        };
        let result = example_gate_only(&config, &introspector, &spec_with_example("'5'\n"));
        assert!(result.passed);
    }

    #[test]
    fn whitespace_differences_fail_the_example_gate() {
        let config = config();
        let introspector = CannedIntrospector {
            outputs: vec!["{'a':1}\n".to_string()],
            error: None,
        };
        let result = example_gate_only(&config, &introspector, &spec_with_example("{'a': 1}\n"));
        assert!(!result.passed);
        assert_eq!(result.gate, GateCategory::ExampleMismatch);
        assert!(result.detail.contains("expected"));
    }

    #[test]
    fn ellipsis_expected_blocks_match_loosely() {
        let config = config();
        let introspector = CannedIntrospector {
            outputs: vec!["['a', 'b', 'c', 'z']\n".to_string()],
            error: None,
        };
        let result =
            example_gate_only(&config, &introspector, &spec_with_example("['a', ..., 'z']\n"));
        assert!(result.passed);
    }

    #[test]
    fn timeouts_report_the_timeout_category() {
        let config = config();
        let introspector = CannedIntrospector {
            outputs: Vec::new(),
            error: Some("example evaluation timed out".to_string()),
        };
        let result = example_gate_only(&config, &introspector, &spec_with_example("'5'\n"));
        assert!(!result.passed);
        assert_eq!(result.gate, GateCategory::Timeout);
    }

    #[test]
    fn one_missing_gate_tool_skips_with_an_install_hint() {
        let config = config();
        let introspector = CannedIntrospector {
            outputs: Vec::new(),
            error: None,
        };
        let harness = Harness::new(&config, &introspector);
        let result = harness.tool_gate(
            GateCategory::Lint,
            "definitely-not-a-real-linter-binary",
            Path::new("impl.py"),
        );
        assert!(result.skipped);
        assert!(result.passed);
        assert!(result.detail.contains("not installed"));
    }

    #[test]
    fn both_missing_gate_tools_fail_the_unit() {
        let lint = GateResult::skip(GateCategory::Lint, "missing".to_string());
        let type_check = GateResult::skip(GateCategory::Type, "missing".to_string());
        let (lint, type_check) = reconcile_missing_tools(lint, type_check);
        assert!(!lint.passed);
        assert!(!type_check.passed);

        let lint = GateResult::skip(GateCategory::Lint, "missing".to_string());
        let type_check = GateResult::pass(GateCategory::Type);
        let (lint, type_check) = reconcile_missing_tools(lint, type_check);
        assert!(lint.passed && lint.skipped);
        assert!(type_check.passed);
    }

    #[test]
    fn sandbox_limits_follow_the_config() {
        let mut config = config();
        config.file.sandbox.enabled = true;
        config.file.sandbox.memory_mb = 128;
        config.file.sandbox.timeout = 3;
        let introspector = CannedIntrospector {
            outputs: Vec::new(),
            error: None,
        };
        let harness = Harness::new(&config, &introspector);
        let limits = harness.limits();
        assert_eq!(limits.memory_mb, Some(128));
        assert_eq!(limits.timeout, Duration::from_secs(3));
    }
}
