//! Project configuration loaded from `vibesafe.toml`.
//!
//! The config file is searched upward from the working directory; all paths
//! in it resolve relative to the directory that holds it, so store layout is
//! stable no matter where the CLI is invoked.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "vibesafe.toml";

/// Environment variable that overrides `project.env`.
pub const ENV_VAR: &str = "VIBESAFE_ENV";

/// Runtime integrity mode: dev regenerates on drift, prod fails on drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Dev,
    Prod,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Dev => "dev",
            RunMode::Prod => "prod",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "dev" => Ok(RunMode::Dev),
            "prod" => Ok(RunMode::Prod),
            other => Err(ConfigError::Invalid {
                field: "env".to_string(),
                detail: format!("expected \"dev\" or \"prod\", got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProjectConfig {
    pub env: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathsConfig {
    pub checkpoints: String,
    pub cache: String,
    pub index: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoints: ".vibesafe/checkpoints".to_string(),
            cache: ".vibesafe/cache".to_string(),
            index: ".vibesafe/index.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PromptsConfig {
    pub function: String,
    pub http: String,
    pub cli: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            function: "prompts/function.j2".to_string(),
            http: "prompts/http_endpoint.j2".to_string(),
            cli: "prompts/cli_command.j2".to_string(),
        }
    }
}

/// One `[provider.<name>]` entry: identity plus deterministic parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProviderConfig {
    pub kind: String,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub seed: u64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    pub timeout: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "openai-compatible".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            seed: 42,
            temperature: 0.0,
            max_tokens: None,
            timeout: 60,
        }
    }
}

impl ProviderConfig {
    /// Provider identity string that participates in `H_spec` and cache keys.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.kind, self.model)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct SandboxConfig {
    pub enabled: bool,
    /// Per-gate subprocess timeout in seconds.
    pub timeout: u64,
    pub memory_mb: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout: 10,
            memory_mb: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct ConfigFile {
    pub project: ProjectConfig,
    pub paths: PathsConfig,
    pub prompts: PromptsConfig,
    pub provider: BTreeMap<String, ProviderConfig>,
    pub sandbox: SandboxConfig,
}

/// Loaded configuration bound to the project root that owns it.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub file: ConfigFile,
}

impl Config {
    /// Load from an explicit project root, falling back to defaults when the
    /// file is absent.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        let file = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&text).map_err(|err| ConfigError::Parse {
                path: path.clone(),
                detail: err.to_string(),
            })?
        } else {
            ConfigFile::default()
        };
        let config = Self {
            root: root.to_path_buf(),
            file,
        };
        config.mode()?;
        Ok(config)
    }

    /// Search upward from `start` for a `vibesafe.toml`; the directory that
    /// holds it becomes the project root. Without one, `start` is the root
    /// and defaults apply.
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        let mut current = start.to_path_buf();
        loop {
            if current.join(CONFIG_FILE_NAME).exists() {
                return Self::load(&current);
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Self::load(start),
            }
        }
    }

    /// Effective run mode: `VIBESAFE_ENV` overrides `project.env`.
    pub fn mode(&self) -> Result<RunMode, ConfigError> {
        match env::var(ENV_VAR) {
            Ok(value) if !value.is_empty() => RunMode::parse(&value),
            _ => RunMode::parse(&self.file.project.env),
        }
    }

    pub fn provider(&self, name: &str) -> ProviderConfig {
        if let Some(found) = self.file.provider.get(name) {
            return found.clone();
        }
        self.file
            .provider
            .get("default")
            .cloned()
            .unwrap_or_default()
    }

    /// Read the provider credential from its configured environment variable.
    pub fn api_key(&self, provider: &ProviderConfig) -> Result<String, ConfigError> {
        match env::var(&provider.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey {
                var: provider.api_key_env.clone(),
            }),
        }
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.resolve_path(&self.file.paths.checkpoints)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve_path(&self.file.paths.cache)
    }

    pub fn index_path(&self) -> PathBuf {
        self.resolve_path(&self.file.paths.index)
    }

    /// Template path configured for a unit kind.
    pub fn template_for_kind(&self, kind: crate::unit::UnitKind) -> &str {
        match kind {
            crate::unit::UnitKind::Function => &self.file.prompts.function,
            crate::unit::UnitKind::Http => &self.file.prompts.http,
            crate::unit::UnitKind::Cli => &self.file.prompts.cli,
        }
    }
}

/// Starter config written by `vibesafe init`.
pub fn starter_config() -> String {
    let file = ConfigFile {
        provider: BTreeMap::from([("default".to_string(), ProviderConfig::default())]),
        ..ConfigFile::default()
    };
    toml::to_string_pretty(&file).expect("serialize starter config")
}
