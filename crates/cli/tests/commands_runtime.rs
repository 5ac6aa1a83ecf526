use optiq_cli::commands::{config, doctor, smoke};

#[test]
fn smoke_runs_the_scripted_pipeline_to_downstream() {
    let result = smoke::run();

    assert_eq!(result.exit_code, 0, "smoke should pass offline: {}", result.output);
    assert!(result.output.contains("smoke: 4/4 checks passed"));
    assert!(result.output.contains("meaning_gate"));
    assert!(result.output.contains("refinement_gate"));
}

#[test]
fn doctor_reports_all_checks_in_json() {
    let output = doctor::run(true);

    let report: serde_json::Value =
        serde_json::from_str(&output).expect("doctor --json emits valid JSON");
    let checks = report["checks"].as_array().expect("checks array");
    let names: Vec<&str> =
        checks.iter().filter_map(|check| check["name"].as_str()).collect();

    assert!(names.contains(&"config_validation"));
    assert!(names.contains(&"model_credential_readiness"));
    assert!(names.contains(&"schema_contracts"));
}

#[test]
fn config_output_redacts_and_attributes_sources() {
    let output = config::run();

    assert!(output.contains("model.provider"));
    assert!(output.contains("session.max_turns"));
    assert!(output.contains("(source:"));
    assert!(!output.to_lowercase().contains("sk-"));
}
