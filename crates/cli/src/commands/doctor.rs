use bistro_core::config::{AppConfig, LlmProvider, LoadOptions};
use bistro_db::CatalogSeed;

use crate::commands::open_database;
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
            checks.push(check_llm_readiness(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_readiness", "database_connectivity", "catalog_presence"] {
                checks.push(skipped(name, "configuration did not load"));
            }
        }
    }

    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail)
        && checks.iter().any(|check| check.status == CheckStatus::Pass);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed or were skipped".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
}

/// The key requirement is enforced by config validation; this reports where
/// completions would go.
fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    if config.llm.provider == LlmProvider::Disabled {
        return skipped("llm_readiness", "the completion fallback is disabled");
    }

    let base_url = config
        .llm
        .base_url
        .as_deref()
        .or_else(|| config.llm.provider.default_base_url())
        .unwrap_or("<unset>");
    DoctorCheck {
        name: "llm_readiness",
        status: CheckStatus::Pass,
        details: format!(
            "{:?} model `{}` via {base_url} ({} retries, {}s timeout)",
            config.llm.provider, config.llm.model, config.llm.max_retries, config.llm.timeout_secs
        ),
    }
}

/// Connectivity (with migrations) and catalog presence. The catalog check is
/// skipped when the database is unreachable.
fn check_database(config: &AppConfig) -> [DoctorCheck; 2] {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return [
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped("catalog_presence", "the async runtime did not start"),
            ];
        }
    };

    let result = runtime.block_on(async {
        let pool = open_database(config)
            .await
            .map_err(|(class, message, _)| format!("{class}: {message}"))?;
        let verification = CatalogSeed::verify(&pool).await;
        pool.close().await;
        Ok::<_, String>(verification)
    });

    match result {
        Ok(verification) => {
            let connectivity = DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`, schema up to date", config.database.url),
            };
            let catalog = match verification {
                Ok(verification) if verification.all_present => DoctorCheck {
                    name: "catalog_presence",
                    status: CheckStatus::Pass,
                    details: format!("{} reference rows present", verification.checks.len()),
                },
                Ok(verification) => {
                    let missing = verification.checks.iter().filter(|(_, present)| !present).count();
                    DoctorCheck {
                        name: "catalog_presence",
                        status: CheckStatus::Fail,
                        details: format!("{missing} reference rows missing; run `bistro seed`"),
                    }
                }
                Err(error) => DoctorCheck {
                    name: "catalog_presence",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
            };
            [connectivity, catalog]
        }
        Err(error) => [
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error },
            skipped("catalog_presence", "the database is unreachable"),
        ],
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
