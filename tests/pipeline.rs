//! End-to-end pipeline tests: compile, verify, save, cache, and drift.

mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vibesafe::error::{Error, SpecError};
use vibesafe::spec::scan::find_unit;
use vibesafe::unit::UnitStatus;
use vibesafe::workflow::{compile_unit, save_unit, test_unit, unit_status};

#[test]
fn compile_test_save_activates_the_checkpoint() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");

    let outcome = compile_unit(&pipeline, &spec, false).expect("compile");
    assert_eq!(outcome.chk_sha.len(), 64);
    assert!(outcome.checkpoint_dir.is_dir());

    // Compile must not activate anything.
    let store = pipeline.store();
    assert_eq!(store.index().active(ADD_STRS_UNIT).expect("active"), None);

    let report = test_unit(&pipeline, &spec).expect("test");
    assert!(report.passed(), "gates failed: {:?}", report.failures());

    let activated = save_unit(&pipeline, &spec).expect("save");
    assert_eq!(activated, outcome.chk_sha);
    assert_eq!(
        store.index().active(ADD_STRS_UNIT).expect("active"),
        Some(outcome.chk_sha.clone())
    );

    // The stored payload is the cleaned artifact, fences stripped.
    let (impl_bytes, meta) = store.read(ADD_STRS_UNIT, &outcome.chk_sha).expect("read");
    let impl_text = String::from_utf8(impl_bytes).expect("utf8 impl");
    assert!(impl_text.starts_with("def add_strs(a: str, b: str) -> str:"));
    assert!(!impl_text.contains("```"));
    assert_eq!(meta.spec_sha, outcome.spec_sha);
    assert_eq!(meta.provider, "openai-compatible:mock-model");
}

#[test]
fn warm_cache_compiles_without_provider_calls() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls.clone());
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");

    let first = compile_unit(&pipeline, &spec, false).expect("first compile");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = compile_unit(&pipeline, &spec, false).expect("second compile");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second run must hit the cache");
    assert_eq!(first.chk_sha, second.chk_sha);

    // --force bypasses the cache read and calls the provider again.
    let forced = compile_unit(&pipeline, &spec, true).expect("forced compile");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(forced.chk_sha, first.chk_sha);
}

#[test]
fn missing_examples_block_save_but_compile_in_dev() {
    let stub = r#"from vibesafe import VibesafeHandled, vibesafe


@vibesafe.func
def shout(text: str) -> str:
    """Uppercase the input."""
    trimmed = text.strip()
    yield VibesafeHandled()
"#;
    let provider_impl = "def shout(text: str) -> str:\n    trimmed = text.strip()\n    return trimmed.upper()\n";
    let project = TestProject::new("dev");
    project.write("app.py", stub);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(provider_impl.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, "app/shout").expect("unit present");
    assert!(spec.examples.is_empty());

    compile_unit(&pipeline, &spec, false).expect("dev compile without examples");

    let err = save_unit(&pipeline, &spec).expect_err("save must fail");
    assert!(matches!(
        err,
        Error::Spec(SpecError::MissingDoctest { .. })
    ));
    assert_eq!(
        pipeline.store().index().active("app/shout").expect("active"),
        None
    );
}

#[test]
fn byte_exact_example_comparison_gates_save() {
    let stub = r#"from vibesafe import VibesafeHandled, vibesafe


@vibesafe.func
def as_dict(key: str) -> dict:
    """Build a one-entry dict.

    >>> as_dict("a")
    {'a': 1}
    """
    name = key
    yield VibesafeHandled()
"#;
    let provider_impl = "def as_dict(key: str) -> dict:\n    name = key\n    return {name: 1}\n";
    let project = TestProject::new("dev");
    project.write("app.py", stub);
    let config = project.config();
    // The artifact "produces" output with different whitespace.
    let introspector = CannedIntrospector::new(&[("as_dict(\"a\")", "{'a':1}\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(provider_impl.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, "app/as_dict").expect("unit present");
    compile_unit(&pipeline, &spec, false).expect("compile");

    let report = test_unit(&pipeline, &spec).expect("test");
    assert!(!report.passed(), "whitespace drift must fail byte-exact compare");

    let err = save_unit(&pipeline, &spec).expect_err("save must fail");
    assert!(matches!(err, Error::Gate(_)));
}

#[test]
fn ellipsis_expected_output_matches_any_span() {
    let stub = r#"from vibesafe import VibesafeHandled, vibesafe


@vibesafe.func
def letters(n: int) -> list:
    """First and last letters with elision.

    >>> letters(4)
    ['a', ..., 'z']
    """
    count = n
    yield VibesafeHandled()
"#;
    let provider_impl = "def letters(n: int) -> list:\n    count = n\n    return ['a', 'b', 'c', 'z']\n";
    let project = TestProject::new("dev");
    project.write("app.py", stub);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("letters(4)", "['a', 'b', 'c', 'z']\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(provider_impl.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, "app/letters").expect("unit present");
    compile_unit(&pipeline, &spec, false).expect("compile");
    save_unit(&pipeline, &spec).expect("ellipsis match activates");
}

#[test]
fn validator_rejects_artifacts_missing_the_unit_symbol() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory("def wrong_name(a: str, b: str) -> str:\n    return a\n".to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    let err = compile_unit(&pipeline, &spec, false).expect_err("must fail validation");
    assert!(matches!(err, Error::Validation(_)));
    // A failed validation writes no checkpoint.
    assert!(pipeline.store().list_checkpoints(ADD_STRS_UNIT).is_empty());
}

#[test]
fn unit_status_tracks_the_pipeline_lifecycle() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");

    let report = unit_status(&pipeline, &spec).expect("status");
    assert_eq!(report.status, UnitStatus::Uncompiled);

    compile_unit(&pipeline, &spec, false).expect("compile");
    save_unit(&pipeline, &spec).expect("save");

    let report = unit_status(&pipeline, &spec).expect("status");
    assert_eq!(report.status, UnitStatus::CompiledActive);

    // Editing the docstring example drifts the unit.
    project.write("app.py", &ADD_STRS_STUB.replace("'5'", "'6'"));
    let specs = pipeline.scan().expect("rescan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    let report = unit_status(&pipeline, &spec).expect("status");
    assert_eq!(report.status, UnitStatus::Drifted);
    assert_ne!(report.current_spec_sha, report.active_spec_sha.unwrap());
}

#[test]
fn provider_identity_participates_in_the_spec_hash() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");

    let provider_a = config.provider("default");
    let mut provider_b = provider_a.clone();
    provider_b.model = "other-model".to_string();

    let hash_a = vibesafe::hash::spec_hash(&spec, "prompts/function.j2", &provider_a);
    let hash_b = vibesafe::hash::spec_hash(&spec, "prompts/function.j2", &provider_b);
    assert_ne!(hash_a, hash_b);
}
