//! Project discovery: walk the source tree and extract every decorated unit.
//!
//! Discovery is reproducible for a given filesystem state: directories are
//! visited in sorted order and units keep their source order within a file.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::spec::extract::extract_units;
use crate::unit::Spec;
use crate::util::collect_files_sorted;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves an external name to `(resolved_path, content_hash)`.
pub trait SymbolResolver {
    fn resolve_symbol(&self, name: &str) -> Option<(String, String)>;
}

/// Resolver that never resolves; every reference becomes a tombstone.
pub struct NullResolver;

impl SymbolResolver for NullResolver {
    fn resolve_symbol(&self, _name: &str) -> Option<(String, String)> {
        None
    }
}

const IGNORE_DIRNAMES: &[&str] = &[
    "__pycache__",
    "node_modules",
    "dist",
    "build",
    "venv",
    "target",
];

fn should_skip_dir(path: &Path, store_dirs: &[PathBuf]) -> bool {
    if store_dirs.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name.starts_with('.') || IGNORE_DIRNAMES.contains(&name),
        None => true,
    }
}

/// Module path for a source file relative to the project root
/// (`app/math/ops.py` becomes `app.math.ops`; `__init__.py` names the
/// package).
pub fn module_path_for(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        parts.push(component.as_os_str().to_str()?.to_string());
    }
    let last = parts.pop()?;
    let stem = last.strip_suffix(".py")?;
    if stem != "__init__" {
        parts.push(stem.to_string());
    }
    if parts.is_empty() || parts.iter().any(|part| part.contains('-')) {
        return None;
    }
    Some(parts.join("."))
}

/// Walk the project and extract every decorated unit, ordered by sorted file
/// path then source position.
pub fn scan_project(config: &Config, resolver: &dyn SymbolResolver) -> Result<Vec<Spec>> {
    let store_dirs = vec![
        config.checkpoints_dir(),
        config.cache_dir(),
        config
            .index_path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| config.root.clone()),
    ];
    let files = collect_files_sorted(&config.root, &|dir| should_skip_dir(dir, &store_dirs))
        .map_err(|source| crate::error::StorageError::ReadFailed {
            path: config.root.clone(),
            source,
        })?;

    let resolve = |name: &str| resolver.resolve_symbol(name);
    let mut specs = Vec::new();
    for file in files {
        if file.extension().and_then(|ext| ext.to_str()) != Some("py") {
            continue;
        }
        let Some(module_path) = module_path_for(&config.root, &file) else {
            continue;
        };
        let Ok(source) = fs::read_to_string(&file) else {
            continue;
        };
        if !source.contains("@vibesafe.") {
            continue;
        }
        let rel = file
            .strip_prefix(&config.root)
            .unwrap_or(&file)
            .to_path_buf();
        specs.extend(extract_units(&source, &module_path, &rel, &resolve)?);
    }
    Ok(specs)
}

/// Find one unit by exact id.
pub fn find_unit(specs: &[Spec], unit_id: &str) -> Result<Spec> {
    specs
        .iter()
        .find(|spec| spec.unit_id == unit_id)
        .cloned()
        .ok_or_else(|| Error::UnknownUnit(unit_id.to_string()))
}

/// Select units by exact id or module-path prefix.
pub fn select_units(specs: &[Spec], target: Option<&str>) -> Result<Vec<Spec>> {
    let Some(target) = target else {
        return Ok(specs.to_vec());
    };
    if let Some(found) = specs.iter().find(|spec| spec.unit_id == target) {
        return Ok(vec![found.clone()]);
    }
    let matched: Vec<Spec> = specs
        .iter()
        .filter(|spec| {
            spec.module_path() == target || spec.module_path().starts_with(&format!("{target}."))
        })
        .cloned()
        .collect();
    if matched.is_empty() {
        return Err(Error::UnknownUnit(target.to_string()));
    }
    Ok(matched)
}
