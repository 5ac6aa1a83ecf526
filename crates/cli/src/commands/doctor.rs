use optiq_core::config::{AppConfig, LoadOptions, ModelProvider};
use optiq_schemas::SchemaRegistry;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_model_credential(&config));
            checks.push(check_schema_contracts(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "model_credential_readiness",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "schema_contracts",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_model_credential(config: &AppConfig) -> DoctorCheck {
    let details = match config.model.provider {
        ModelProvider::OpenAi | ModelProvider::Anthropic => {
            "api key present; format validated by config contract".to_string()
        }
        ModelProvider::Ollama => format!(
            "local provider configured at `{}`",
            config.model.base_url.as_deref().unwrap_or_default()
        ),
    };

    DoctorCheck { name: "model_credential_readiness", status: CheckStatus::Pass, details }
}

fn check_schema_contracts(config: &AppConfig) -> DoctorCheck {
    let result = match &config.schemas.dir {
        Some(dir) => SchemaRegistry::load_from_dir(dir)
            .map(|registry| format!("loaded from `{}`: {:?}", dir.display(), registry.names())),
        None => SchemaRegistry::builtin()
            .map(|registry| format!("builtin contracts compiled: {:?}", registry.names())),
    };

    match result {
        Ok(details) => DoctorCheck { name: "schema_contracts", status: CheckStatus::Pass, details },
        Err(error) => DoctorCheck {
            name: "schema_contracts",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
