use difychat_core::config::{AppConfig, LoadOptions};
use difychat_db::connect_with_settings;
use secrecy::ExposeSecret;
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
    let report = build_report(AppConfig::load(LoadOptions::default()));

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

fn build_report(
    loaded: Result<AppConfig, difychat_core::config::ConfigError>,
) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_upstream(&config));
            checks.push(check_slack(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["upstream_readiness", "slack_readiness", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let config_loaded = checks.first().is_some_and(|check| check.status == CheckStatus::Pass);
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let healthy = config_loaded && !any_failed;
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_upstream(config: &AppConfig) -> DoctorCheck {
    let key_present = !config.upstream.api_key.expose_secret().trim().is_empty();
    DoctorCheck {
        name: "upstream_readiness",
        status: if key_present { CheckStatus::Pass } else { CheckStatus::Fail },
        details: format!(
            "POST {}/chat-messages as `{}` (timeout {}s, no retries)",
            config.upstream.base_url.trim_end_matches('/'),
            config.upstream.user,
            config.upstream.timeout_secs
        ),
    }
}

// Slack is optional; an unset client id only disables the install link.
fn check_slack(config: &AppConfig) -> DoctorCheck {
    match (&config.slack.client_id, &config.slack.signing_secret) {
        (Some(client_id), signing_secret) => DoctorCheck {
            name: "slack_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "install link enabled for client `{client_id}`; events endpoint {}",
                if signing_secret.is_some() { "enabled" } else { "disabled (no signing secret)" }
            ),
        },
        (None, _) => DoctorCheck {
            name: "slack_readiness",
            status: CheckStatus::Skipped,
            details: "slack.client_id is not set; /api/slack/install will return 503".to_string(),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
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
