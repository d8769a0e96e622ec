//! Runtime loader tests: prod integrity enforcement and dev convergence.

mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vibesafe::error::{Error, IntegrityError};
use vibesafe::introspect::PythonIntrospector;
use vibesafe::runtime::Loader;
use vibesafe::spec::scan::find_unit;
use vibesafe::workflow::{compile_unit, save_unit};

#[test]
fn prod_load_fails_when_nothing_is_active() {
    let project = TestProject::new("prod");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls.clone());
    let pipeline = pipeline(&config, &introspector, &factory);

    let loader = Loader::new(&pipeline);
    let err = loader.load(ADD_STRS_UNIT).expect_err("must fail");
    assert!(matches!(
        err,
        Error::Integrity(IntegrityError::CheckpointMissing { .. })
    ));
    // Prod never generates.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn prod_load_fails_on_spec_drift_without_executing() {
    let project = TestProject::new("prod");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls.clone());
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    compile_unit(&pipeline, &spec, false).expect("compile");
    save_unit(&pipeline, &spec).expect("save");

    // Change the expected output in the docstring: the spec hash drifts.
    project.write("app.py", &ADD_STRS_STUB.replace("'5'", "'6'"));

    let executions_before = introspector.executions.load(Ordering::SeqCst);
    let loader = Loader::new(&pipeline);
    let err = loader.load(ADD_STRS_UNIT).expect_err("must fail");
    match err {
        Error::Integrity(IntegrityError::HashMismatch {
            unit_id,
            active,
            current,
        }) => {
            assert_eq!(unit_id, ADD_STRS_UNIT);
            assert_ne!(active, current);
        }
        other => panic!("expected HashMismatch, got {other}"),
    }
    // The artifact was never executed during the failed load.
    assert_eq!(
        introspector.executions.load(Ordering::SeqCst),
        executions_before
    );
    // And no regeneration happened.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn dev_load_regenerates_on_drift_and_activates_the_new_checkpoint() {
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();

    // First activation against the original docstring.
    {
        let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
        let pipeline = pipeline(&config, &introspector, &factory);
        let specs = pipeline.scan().expect("scan");
        let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
        compile_unit(&pipeline, &spec, false).expect("compile");
        save_unit(&pipeline, &spec).expect("save");
    }

    let store_config = project.config();
    let old_active = vibesafe::store::Store::new(&store_config)
        .index()
        .active(ADD_STRS_UNIT)
        .expect("read index")
        .expect("active entry");

    // Drift the spec; the canned artifact now "produces" the new output so
    // regeneration verifies cleanly.
    project.write("app.py", &ADD_STRS_STUB.replace("'5'", "'6'"));
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'6'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls.clone());
    let pipeline = pipeline(&config, &introspector, &factory);

    let loader = Loader::new(&pipeline);
    let artifact = loader.load(ADD_STRS_UNIT).expect("dev load converges");

    let store = pipeline.store();
    let new_active = store
        .index()
        .active(ADD_STRS_UNIT)
        .expect("read index")
        .expect("active entry");
    assert_ne!(new_active, old_active, "a fresh checkpoint must be active");
    assert_eq!(artifact.chk_sha, new_active);

    // Convergence: the active checkpoint's spec hash matches current source.
    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    let provider_config = config.provider("default");
    let current = vibesafe::hash::spec_hash(&spec, "prompts/function.j2", &provider_config);
    let meta = store.read_meta(ADD_STRS_UNIT, &new_active).expect("meta");
    assert_eq!(meta.spec_sha, current);
}

#[test]
fn prod_load_detects_tampered_checkpoint_payloads() {
    let project = TestProject::new("prod");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let introspector = CannedIntrospector::new(&[("add_strs(\"2\", \"3\")", "'5'\n")]);
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
    let pipeline = pipeline(&config, &introspector, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    compile_unit(&pipeline, &spec, false).expect("compile");
    let chk_sha = save_unit(&pipeline, &spec).expect("save");

    // Corrupt the payload behind the store's back.
    let impl_path = pipeline.store().impl_path(ADD_STRS_UNIT, &chk_sha);
    std::fs::write(&impl_path, "def add_strs(a: str, b: str) -> str:\n    return 'hacked'\n")
        .expect("tamper");

    let loader = Loader::new(&pipeline);
    let err = loader.load(ADD_STRS_UNIT).expect_err("must fail");
    assert!(matches!(
        err,
        Error::Integrity(IntegrityError::HashMismatch { .. })
    ));
}

#[test]
fn loaded_artifact_invokes_through_python() {
    if !python3_available() {
        eprintln!("skipping: python3 not available");
        return;
    }
    let project = TestProject::new("dev");
    project.write("app.py", ADD_STRS_STUB);
    let config = project.config();
    let python = PythonIntrospector::new(config.root.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let factory = mock_factory(ADD_STRS_IMPL.to_string(), calls);
    let pipeline = pipeline(&config, &python, &factory);

    let specs = pipeline.scan().expect("scan");
    let spec = find_unit(&specs, ADD_STRS_UNIT).expect("unit present");
    compile_unit(&pipeline, &spec, false).expect("compile");
    save_unit(&pipeline, &spec).expect("save");

    let loader = Loader::new(&pipeline);
    let artifact = loader.load(ADD_STRS_UNIT).expect("load");
    let output = artifact
        .invoke("add_strs(\"2\", \"3\")", &python)
        .expect("invoke");
    assert_eq!(output, "'5'\n");
}
