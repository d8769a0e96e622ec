//! Spec extraction: turning decorated source stubs into canonical `Spec`
//! records.
//!
//! Extraction is purely textual so hashing is stable across host runtimes;
//! anything that needs the host language (symbol resolution, artifact
//! loading) goes through the introspector port instead.

pub mod doctest;
pub mod extract;
pub mod scan;

pub use extract::extract_units;
pub use scan::{scan_project, SymbolResolver};
