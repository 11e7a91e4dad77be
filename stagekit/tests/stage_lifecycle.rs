//! Library-level tests for a stage starting up inside a research project.
//!
//! These drive `setup_stage` the way a stage binary does: discover the root
//! from the script location and resolve the rule context. Log routing lives in
//! `stage_log_routing.rs`, since the attached stage file is process-wide.

use std::fs;

use chrono::Utc;
use stagekit::core::context::{ContextOrigin, RuleContext, Value};
use stagekit::error::{ResolveError, find_resolve_error};
use stagekit::rule::RuleRequest;
use stagekit::stage::{StageOptions, setup_stage_at};
use stagekit::test_support::ProjectFixture;

#[test]
fn static_context_matches_declared_rule() {
    let fixture = ProjectFixture::new();
    let options = StageOptions {
        start: Some(fixture.path("dgp/simulate_baseline/code/simulate.py")),
        log: false,
        ..StageOptions::for_rule(RuleRequest::named("simulate"))
    };

    let stage = setup_stage_at(options, &Utc::now()).expect("setup stage");
    let context = &stage.context.context;
    assert_eq!(
        context.output.path("sim_data"),
        Some(
            fixture
                .path("dgp/simulate_baseline/output/sim_data.csv")
                .as_path()
        )
    );
    assert_eq!(context.params.get("seed"), Some(&Value::Int(42)));
    assert_eq!(context.params.get("n_obs"), Some(&Value::Int(1000)));
    assert_eq!(
        context.input.nth(0).and_then(Value::as_path),
        Some(fixture.path("config.yaml").as_path())
    );
    assert_eq!(
        context.script,
        Some(fixture.path("dgp/simulate_baseline/code/simulate.py"))
    );
}

#[test]
fn script_in_included_file_resolves_to_stage_folder() {
    let fixture = ProjectFixture::new();
    let options = StageOptions {
        start: Some(fixture.root().to_path_buf()),
        log: false,
        ..StageOptions::for_rule(RuleRequest::named("add_shocks"))
    };

    let stage = setup_stage_at(options, &Utc::now()).expect("setup stage");
    assert_eq!(
        stage.context.context.script,
        Some(fixture.path("dgp/add_shocks/code/add_shocks.py"))
    );
    let location = stage.context.log_location().expect("log location");
    assert_eq!(location.dir, fixture.path("dgp/add_shocks/logs"));
}

#[test]
fn unknown_rule_fails_without_creating_logs() {
    let fixture = ProjectFixture::new();
    let options = StageOptions {
        start: Some(fixture.root().to_path_buf()),
        ..StageOptions::for_rule(RuleRequest::named("nonexistent_rule"))
    };

    let err = setup_stage_at(options, &Utc::now()).unwrap_err();
    match find_resolve_error(&err) {
        Some(ResolveError::RuleNotFound { rule, .. }) => assert_eq!(rule, "nonexistent_rule"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("nonexistent_rule"));
    assert!(!fixture.path("analysis/estimate_model/logs").exists());
}

#[test]
fn injected_context_skips_workflow_and_derives_logs_from_scriptdir() {
    let fixture = ProjectFixture::new();
    fs::remove_file(fixture.path("Snakefile")).expect("remove workflow");
    let json = format!(
        r#"{{
            "rule": "simulate",
            "output": [{{"name": "sim_data", "value": "dgp/simulate_baseline/output/sim_data.csv"}}],
            "params": [{{"name": "seed", "value": 7}}],
            "scriptdir": "{}"
        }}"#,
        fixture.path("dgp/simulate_baseline/code").display()
    );
    let injected: RuleContext = serde_json::from_str(&json).expect("parse context");

    let options = StageOptions {
        log: false,
        ..StageOptions::injected(injected.clone())
    };
    let stage = setup_stage_at(options, &Utc::now()).expect("stage");

    assert_eq!(stage.context.origin, ContextOrigin::Injected);
    assert_eq!(stage.context.context, injected);
    assert_eq!(stage.project.root, fixture.root());
    let location = stage.context.log_location().expect("log location");
    assert_eq!(location.dir, fixture.path("dgp/simulate_baseline/logs"));
    assert_eq!(location.name, "simulate");
}
