//! Orchestration of the spec -> hash -> checkpoint -> verify -> activate
//! pipeline.
//!
//! Each verb is a small module so the CLI stays thin; the `Pipeline` value
//! carries the injected collaborators (introspector, provider factory) that
//! tests substitute.

mod compile;
mod init;
mod report;
mod verify;

pub mod pool;

pub use compile::{compile_many, compile_unit, report_compile_results, CompileOutcome};
pub use init::run_init;
pub use report::{run_check, run_diff, run_scan, run_status, unit_status, UnitReport};
pub use verify::{freeze_http_deps, save_unit, test_unit};

use crate::config::{Config, ProviderConfig};
use crate::error::Result;
use crate::introspect::Introspector;
use crate::provider::{CachedProvider, Provider};
use crate::spec::scan::SymbolResolver;
use crate::store::Store;
use crate::unit::Spec;
use crate::validate::Validator;

/// Builds a provider for a resolved `[provider.<name>]` entry.
pub type ProviderFactory<'a> = &'a (dyn Fn(&ProviderConfig) -> Result<Box<dyn Provider>> + Sync);

/// Gate Tool commands used by the harness; overridable for tests and hosts
/// with nonstandard toolchains.
#[derive(Debug, Clone)]
pub struct GateCommands {
    pub lint: String,
    pub type_check: String,
}

impl Default for GateCommands {
    fn default() -> Self {
        Self {
            lint: crate::harness::LINT_COMMAND.to_string(),
            type_check: crate::harness::TYPE_COMMAND.to_string(),
        }
    }
}

/// Injected collaborators plus configuration for one CLI invocation.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub introspector: &'a (dyn Introspector + Sync),
    pub provider_factory: ProviderFactory<'a>,
    pub validator: Validator,
    pub gates: GateCommands,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        introspector: &'a (dyn Introspector + Sync),
        provider_factory: ProviderFactory<'a>,
    ) -> Self {
        Self {
            config,
            introspector,
            provider_factory,
            validator: Validator::default(),
            gates: GateCommands::default(),
        }
    }

    /// Harness wired with this pipeline's gate commands.
    pub fn harness(&self) -> crate::harness::Harness<'_> {
        crate::harness::Harness::new(self.config, self.introspector)
            .with_gate_commands(&self.gates.lint, &self.gates.type_check)
    }

    pub fn store(&self) -> Store {
        Store::new(self.config)
    }

    /// Scan the project for every decorated unit.
    pub fn scan(&self) -> Result<Vec<Spec>> {
        struct Adapter<'b>(&'b (dyn Introspector + Sync));
        impl SymbolResolver for Adapter<'_> {
            fn resolve_symbol(&self, name: &str) -> Option<(String, String)> {
                self.0.resolve_symbol(name)
            }
        }
        crate::spec::scan_project(self.config, &Adapter(self.introspector))
    }

    /// Cached provider for a unit's provider reference.
    pub fn provider_for(&self, provider_ref: &str) -> Result<(ProviderConfig, CachedProvider)> {
        let provider_config = self.config.provider(provider_ref);
        let inner = (self.provider_factory)(&provider_config)?;
        Ok((
            provider_config,
            CachedProvider::new(inner, self.config.cache_dir()),
        ))
    }
}
