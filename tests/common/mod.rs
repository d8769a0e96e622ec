//! Shared test infrastructure for pipeline integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use vibesafe::config::{Config, ProviderConfig};
use vibesafe::error::{ProviderError, Result};
use vibesafe::exec::{ExecLimits, ExecResult};
use vibesafe::introspect::{ExampleRun, Introspector};
use vibesafe::provider::{Provider, ProviderParams};
use vibesafe::unit::Example;
use vibesafe::workflow::{GateCommands, Pipeline, ProviderFactory};

/// A scratch project directory with a vibesafe.toml.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new(env: &str) -> Self {
        let dir = TempDir::new().expect("temp project dir");
        let config = format!(
            r#"[project]
env = "{env}"

[provider.default]
kind = "openai-compatible"
model = "mock-model"
seed = 42
temperature = 0.0
timeout = 5
"#
        );
        fs::write(dir.path().join("vibesafe.toml"), config).expect("write config");
        Self { dir }
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(path, content).expect("write project file");
    }

    pub fn config(&self) -> Config {
        Config::load(self.dir.path()).expect("load config")
    }
}

/// Provider spy: returns a fixed completion and counts network calls.
pub struct MockProvider {
    pub response: String,
    pub calls: Arc<AtomicUsize>,
}

impl Provider for MockProvider {
    fn complete(
        &self,
        _prompt: &str,
        _params: &ProviderParams,
    ) -> std::result::Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }

    fn identity(&self) -> String {
        "openai-compatible:mock-model".to_string()
    }
}

/// Deterministic introspector: no interpreter, canned example outputs, and a
/// counter proving whether any artifact was executed.
pub struct CannedIntrospector {
    /// Maps example input source to the output the artifact would produce.
    pub outputs: BTreeMap<String, String>,
    pub executions: Arc<AtomicUsize>,
}

impl CannedIntrospector {
    pub fn new(outputs: &[(&str, &str)]) -> Self {
        Self {
            outputs: outputs
                .iter()
                .map(|(input, output)| (input.to_string(), output.to_string()))
                .collect(),
            executions: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Introspector for CannedIntrospector {
    fn parse_source(&self, _source: &str) -> std::result::Result<(), String> {
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
        examples: &[Example],
        _limits: ExecLimits,
    ) -> std::result::Result<ExampleRun, String> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(ExampleRun {
            outputs: examples
                .iter()
                .map(|example| {
                    self.outputs
                        .get(&example.input_source)
                        .cloned()
                        .unwrap_or_default()
                })
                .collect(),
        })
    }

    fn run_properties(
        &self,
        _impl_path: &Path,
        _source: &str,
        _limits: ExecLimits,
    ) -> std::result::Result<ExecResult, String> {
        Err("canned introspector does not run properties".to_string())
    }
}

/// Build a provider factory that hands out mock providers sharing one call
/// counter.
pub fn mock_factory(
    response: String,
    calls: Arc<AtomicUsize>,
) -> impl Fn(&ProviderConfig) -> Result<Box<dyn Provider>> + Sync {
    move |_config: &ProviderConfig| -> Result<Box<dyn Provider>> {
        Ok(Box::new(MockProvider {
            response: response.clone(),
            calls: calls.clone(),
        }))
    }
}

/// Pipeline with gate tools that always pass (`true` exists everywhere the
/// tests run).
pub fn pipeline<'a>(
    config: &'a Config,
    introspector: &'a (dyn Introspector + Sync),
    factory: ProviderFactory<'a>,
) -> Pipeline<'a> {
    let mut pipeline = Pipeline::new(config, introspector, factory);
    pipeline.gates = GateCommands {
        lint: "true".to_string(),
        type_check: "true".to_string(),
    };
    pipeline
}

/// Skip guard for tests that execute real Python.
pub fn python3_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Happy-path stub used across tests (spec scenario S1).
pub const ADD_STRS_STUB: &str = r#"import vibesafe
from vibesafe import VibesafeHandled


@vibesafe.func
def add_strs(a: str, b: str) -> str:
    """Add two ints represented as strings.

    >>> add_strs("2", "3")
    '5'
    """
    a_int, b_int = int(a), int(b)
    yield VibesafeHandled()
"#;

/// A valid implementation for the stub above, as a provider would return it.
pub const ADD_STRS_IMPL: &str = r#"```python
def add_strs(a: str, b: str) -> str:
    a_int, b_int = int(a), int(b)
    return str(a_int + b_int)
```"#;

pub const ADD_STRS_UNIT: &str = "app/add_strs";
