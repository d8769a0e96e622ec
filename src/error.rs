//! Error taxonomy for the pipeline.
//!
//! Every error maps to a stable category so the CLI can report a phase, the
//! failing unit, a remediation hint, and a process exit code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for expected failures (gate, validation, drift).
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for provider errors.
pub const EXIT_PROVIDER: i32 = 3;
/// Exit code for integrity violations in prod.
pub const EXIT_INTEGRITY: i32 = 4;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while extracting a unit's spec from source.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("{unit_id}: spec declares no doctest examples")]
    MissingDoctest { unit_id: String },

    #[error("{unit_id}: invalid signature: {detail}")]
    InvalidSignature { unit_id: String, detail: String },

    #[error("{unit_id}: no VibesafeHandled sentinel in function body")]
    SentinelMissing { unit_id: String },

    #[error("{unit_id}: unknown decorator option {option:?}")]
    DecoratorOptionInvalid { unit_id: String, option: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {template}")]
    NotFound { template: String },

    #[error("template {template} failed to render: {detail}")]
    Render { template: String, detail: String },
}

/// Provider failure categories; `quota` and `network` are retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Auth,
    Quota,
    Network,
    Protocol,
    Malformed,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Auth => "auth",
            ProviderErrorKind::Quota => "quota",
            ProviderErrorKind::Network => "network",
            ProviderErrorKind::Protocol => "protocol",
            ProviderErrorKind::Malformed => "malformed",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, ProviderErrorKind::Quota | ProviderErrorKind::Network)
    }
}

#[derive(Debug, Error)]
#[error("provider error ({}): {message}", .kind.as_str())]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Structural or semantic validation failure on generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    Parse,
    MissingSymbol,
    SignatureMismatch,
    ForbiddenConstruct,
    UnresolvedImport,
    Oversized,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Parse => "parse",
            ValidationKind::MissingSymbol => "missing_symbol",
            ValidationKind::SignatureMismatch => "signature_mismatch",
            ValidationKind::ForbiddenConstruct => "forbidden_construct",
            ValidationKind::UnresolvedImport => "unresolved_import",
            ValidationKind::Oversized => "oversized",
        }
    }
}

#[derive(Debug, Error)]
#[error("validation failed ({}) at {location}: {detail}", .kind.as_str())]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub location: String,
    pub detail: String,
}

/// Category of a failing verification gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCategory {
    ExampleMismatch,
    Lint,
    Type,
    Property,
    Timeout,
    Sandbox,
}

impl GateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateCategory::ExampleMismatch => "example_mismatch",
            GateCategory::Lint => "lint",
            GateCategory::Type => "type",
            GateCategory::Property => "property",
            GateCategory::Timeout => "timeout",
            GateCategory::Sandbox => "sandbox",
        }
    }
}

#[derive(Debug, Error)]
#[error("{unit_id}: gate {} failed: {detail}", .category.as_str())]
pub struct GateFailure {
    pub unit_id: String,
    pub category: GateCategory,
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("write failed for {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint bytes hash to {actual}, expected {expected}")]
    HashMismatchOnWrite { expected: String, actual: String },

    #[error("index lock contended at {path}")]
    IndexLockContended { path: PathBuf },

    #[error("read failed for {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed metadata at {path}: {detail}")]
    MalformedMeta { path: PathBuf, detail: String },
}

/// Integrity violations raised by the runtime loader in prod.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("{unit_id}: spec hash {current} does not match active checkpoint {active}")]
    HashMismatch {
        unit_id: String,
        active: String,
        current: String,
    },

    #[error("{unit_id}: no active checkpoint")]
    CheckpointMissing { unit_id: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid value for {field}: {detail}")]
    Invalid { field: String, detail: String },

    #[error("API key environment variable {var} is not set")]
    MissingApiKey { var: String },
}

/// Top-level error for every pipeline operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gate(#[from] GateFailure),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
    #[error("{unit_id}: no checkpoint to operate on")]
    NoCheckpoint { unit_id: String },
}

impl Error {
    /// Process exit code per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Provider(_) => EXIT_PROVIDER,
            Error::Integrity(_) => EXIT_INTEGRITY,
            _ => EXIT_FAILURE,
        }
    }

    /// One-line remediation hint shown alongside the error.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Error::Spec(SpecError::MissingDoctest { .. }) => {
                Some("add at least one `>>>` example to the docstring")
            }
            Error::Spec(SpecError::SentinelMissing { .. }) => {
                Some("end the stub body with `yield VibesafeHandled()`")
            }
            Error::Spec(SpecError::InvalidSignature { .. }) => {
                Some("annotate every parameter and the return type")
            }
            Error::Spec(SpecError::DecoratorOptionInvalid { .. }) => {
                Some("only provider/template (plus method/path/tags for http) are accepted")
            }
            Error::Template(TemplateError::NotFound { .. }) => {
                Some("check the [prompts] paths in vibesafe.toml")
            }
            Error::Provider(err) if err.kind == ProviderErrorKind::Auth => {
                Some("set the provider API key environment variable")
            }
            Error::Integrity(IntegrityError::CheckpointMissing { .. }) => {
                Some("run `vibesafe compile` and `vibesafe save`")
            }
            Error::Integrity(IntegrityError::HashMismatch { .. }) => {
                Some("the spec changed since activation; recompile and save")
            }
            Error::Gate(_) => Some("inspect the gate output, fix the spec, and recompile"),
            Error::Config(ConfigError::MissingApiKey { .. }) => {
                Some("export the API key before compiling")
            }
            Error::UnknownUnit(_) => Some("run `vibesafe scan` to list known units"),
            Error::NoCheckpoint { .. } => Some("run `vibesafe compile` first"),
            _ => None,
        }
    }
}
