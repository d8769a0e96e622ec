//! Target Introspector port: the host-language capabilities the core needs.
//!
//! The pipeline never parses, imports, or executes Python itself; it asks an
//! `Introspector`. The shipped implementation drives a `python3` subprocess
//! and scans project files for top-level definitions. Tests substitute a
//! deterministic stub.

use crate::exec::{run_limited, ExecLimits, ExecResult};
use crate::unit::Example;
use crate::util::{collect_files_sorted, sha256_hex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXAMPLE_RUNNER: &str = include_str!("../drivers/example_runner.py");
pub const PROPERTY_RUNNER: &str = include_str!("../drivers/property_runner.py");

/// Modules accepted by import resolution without consulting the interpreter.
const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "asyncio", "base64", "bisect", "collections", "contextlib", "copy",
    "csv", "dataclasses", "datetime", "decimal", "enum", "fractions", "functools", "hashlib",
    "heapq", "io", "itertools", "json", "logging", "math", "operator", "os", "pathlib",
    "random", "re", "secrets", "shutil", "statistics", "string", "sys", "textwrap", "time",
    "typing", "unicodedata", "uuid",
];

/// Outcome of evaluating a unit's examples in one interpreter session.
#[derive(Debug)]
pub struct ExampleRun {
    /// Actual output per example, aligned with the request order.
    pub outputs: Vec<String>,
}

/// Host-language capabilities injected into the pipeline.
pub trait Introspector {
    /// Check that `source` parses in the target language; `Err` carries the
    /// syntax error detail.
    fn parse_source(&self, source: &str) -> Result<(), String>;

    /// Resolve an external name to `(resolved_path, content_hash)`.
    fn resolve_symbol(&self, name: &str) -> Option<(String, String)>;

    /// Whether a top-level import target is known.
    fn resolve_import(&self, module: &str) -> bool;

    /// Evaluate examples against an artifact in one shared session.
    fn run_examples(
        &self,
        impl_path: &Path,
        examples: &[Example],
        limits: ExecLimits,
    ) -> Result<ExampleRun, String>;

    /// Run property-test source against an artifact; `Ok` means all passed.
    fn run_properties(
        &self,
        impl_path: &Path,
        source: &str,
        limits: ExecLimits,
    ) -> Result<ExecResult, String>;
}

#[derive(Serialize)]
struct DriverRequest<'a> {
    examples: Vec<DriverExample<'a>>,
}

#[derive(Serialize)]
struct DriverExample<'a> {
    source: &'a str,
}

#[derive(Deserialize)]
struct DriverReply {
    outputs: Vec<String>,
}

/// Project-backed introspector driving `python3`.
pub struct PythonIntrospector {
    root: PathBuf,
    python: String,
    /// Lazily built map of top-level name -> defining file.
    symbols: Mutex<Option<BTreeMap<String, PathBuf>>>,
}

impl PythonIntrospector {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            python: "python3".to_string(),
            symbols: Mutex::new(None),
        }
    }

    fn python_available(&self) -> bool {
        run_limited(
            &self.python,
            &["--version".to_string()],
            None,
            None,
            ExecLimits::timeout_only(Duration::from_secs(5)),
        )
        .map(|result| result.success())
        .unwrap_or(false)
    }

    fn symbol_table(&self) -> BTreeMap<String, PathBuf> {
        let mut cached = self.symbols.lock().expect("symbol table lock");
        if let Some(table) = cached.as_ref() {
            return table.clone();
        }
        let mut table = BTreeMap::new();
        let files = collect_files_sorted(&self.root, &|dir| {
            dir.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with('.') || name == "__pycache__")
                .unwrap_or(true)
        })
        .unwrap_or_default();
        for file in files {
            if file.extension().and_then(|ext| ext.to_str()) != Some("py") {
                continue;
            }
            let Ok(source) = fs::read_to_string(&file) else {
                continue;
            };
            for line in source.lines() {
                if let Some(name) = top_level_definition(line) {
                    table.entry(name).or_insert_with(|| file.clone());
                }
            }
        }
        *cached = Some(table.clone());
        table
    }

    fn project_modules(&self) -> Vec<String> {
        let table = self.symbol_table();
        let mut modules: Vec<String> = table
            .values()
            .filter_map(|path| crate::spec::scan::module_path_for(&self.root, path))
            .collect();
        modules.sort();
        modules.dedup();
        modules
    }
}

/// Name defined by a top-level `def`, `class`, or simple assignment line.
fn top_level_definition(line: &str) -> Option<String> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }
    if let Some(rest) = line
        .strip_prefix("def ")
        .or_else(|| line.strip_prefix("async def "))
        .or_else(|| line.strip_prefix("class "))
    {
        let name: String = rest
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .collect();
        return (!name.is_empty()).then_some(name);
    }
    let (lhs, rest) = line.split_once('=')?;
    if rest.starts_with('=') {
        return None;
    }
    let lhs = lhs.trim();
    if !lhs.is_empty()
        && lhs
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !lhs.chars().next().is_some_and(|ch| ch.is_ascii_digit())
    {
        return Some(lhs.to_string());
    }
    None
}

impl Introspector for PythonIntrospector {
    fn parse_source(&self, source: &str) -> Result<(), String> {
        let result = run_limited(
            &self.python,
            &[
                "-c".to_string(),
                "import ast, sys; ast.parse(sys.stdin.read())".to_string(),
            ],
            Some(source.as_bytes()),
            None,
            ExecLimits::timeout_only(Duration::from_secs(10)),
        )
        .map_err(|err| format!("spawn {}: {err}", self.python))?;
        if result.success() {
            Ok(())
        } else {
            Err(result.stderr_text().trim().to_string())
        }
    }

    fn resolve_symbol(&self, name: &str) -> Option<(String, String)> {
        let table = self.symbol_table();
        let file = table.get(name)?;
        let bytes = fs::read(file).ok()?;
        let rel = file
            .strip_prefix(&self.root)
            .unwrap_or(file)
            .to_string_lossy()
            .to_string();
        Some((rel, sha256_hex(&bytes)))
    }

    fn resolve_import(&self, module: &str) -> bool {
        let top = module.split('.').next().unwrap_or(module);
        if STDLIB_MODULES.contains(&top) {
            return true;
        }
        if self.project_modules().iter().any(|known| {
            known == module || known == top || known.starts_with(&format!("{top}."))
        }) {
            return true;
        }
        if !self.python_available() {
            return false;
        }
        run_limited(
            &self.python,
            &[
                "-c".to_string(),
                format!(
                    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec({top:?}) else 1)"
                ),
            ],
            None,
            None,
            ExecLimits::timeout_only(Duration::from_secs(10)),
        )
        .map(|result| result.success())
        .unwrap_or(false)
    }

    fn run_examples(
        &self,
        impl_path: &Path,
        examples: &[Example],
        limits: ExecLimits,
    ) -> Result<ExampleRun, String> {
        let request = DriverRequest {
            examples: examples
                .iter()
                .map(|example| DriverExample {
                    source: &example.input_source,
                })
                .collect(),
        };
        let stdin = serde_json::to_vec(&request).map_err(|err| err.to_string())?;
        let result = run_limited(
            &self.python,
            &[
                "-c".to_string(),
                EXAMPLE_RUNNER.to_string(),
                impl_path.display().to_string(),
            ],
            Some(&stdin),
            Some(&self.root),
            limits,
        )
        .map_err(|err| format!("spawn {}: {err}", self.python))?;
        if result.timed_out {
            return Err("example evaluation timed out".to_string());
        }
        if !result.success() {
            return Err(result.stderr_text().trim().to_string());
        }
        let reply: DriverReply = serde_json::from_slice(&result.stdout)
            .map_err(|err| format!("driver reply was not JSON: {err}"))?;
        Ok(ExampleRun {
            outputs: reply.outputs,
        })
    }

    fn run_properties(
        &self,
        impl_path: &Path,
        source: &str,
        limits: ExecLimits,
    ) -> Result<ExecResult, String> {
        run_limited(
            &self.python,
            &[
                "-c".to_string(),
                PROPERTY_RUNNER.to_string(),
                impl_path.display().to_string(),
            ],
            Some(source.as_bytes()),
            Some(&self.root),
            limits,
        )
        .map_err(|err| format!("spawn {}: {err}", self.python))
    }
}

impl crate::spec::scan::SymbolResolver for PythonIntrospector {
    fn resolve_symbol(&self, name: &str) -> Option<(String, String)> {
        Introspector::resolve_symbol(self, name)
    }
}
