//! Output formatting for CLI commands
//!
//! Workflow outcomes are printed either as short human-readable lines or as
//! one JSON document, so scripts can consume them.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::workflow::{RunReport, WorkflowFailure};

/// Machine-readable outcome of `credflow run`.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunSummary {
    Done {
        run_id: String,
        tenant: String,
        status: u16,
        token_attempts: u32,
        token_wait_ms: u64,
        started_at: String,
        finished_at: String,
        transitions: Vec<String>,
    },
    Failed {
        run_id: String,
        tenant: String,
        stage: String,
        kind: String,
        reached: String,
        error: String,
    },
}

impl From<&RunReport> for RunSummary {
    fn from(report: &RunReport) -> Self {
        RunSummary::Done {
            run_id: report.run_id.to_string(),
            tenant: report.tenant.to_string(),
            status: report.action.status,
            token_attempts: report.token_attempts,
            token_wait_ms: report.token_wait.as_millis() as u64,
            started_at: report.started_at.to_rfc3339(),
            finished_at: report.finished_at.to_rfc3339(),
            transitions: report.transitions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl From<&WorkflowFailure> for RunSummary {
    fn from(failure: &WorkflowFailure) -> Self {
        RunSummary::Failed {
            run_id: failure.run_id.to_string(),
            tenant: failure.tenant.to_string(),
            stage: failure.stage.to_string(),
            kind: failure.kind.to_string(),
            reached: failure.reached.to_string(),
            error: failure.source.to_string(),
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

pub fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }

    match summary {
        RunSummary::Done { tenant, status, token_attempts, token_wait_ms, .. } => {
            println!(
                "✓ Workflow done for tenant '{}': action returned HTTP {} (token after {} attempts, {}ms)",
                tenant, status, token_attempts, token_wait_ms
            );
        }
        RunSummary::Failed { tenant, stage, kind, error, .. } => {
            eprintln!("✗ Workflow failed for tenant '{}' at stage {} ({})", tenant, stage, kind);
            eprintln!("  {}", error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AuthScope, ErrorKind};
    use crate::action::InvocationError;
    use crate::secrets::TenantId;
    use crate::workflow::{Stage, StageError, WorkflowState};

    #[test]
    fn test_failure_summary_fields() {
        let failure = WorkflowFailure {
            run_id: uuid::Uuid::nil(),
            tenant: TenantId::new("t1").unwrap(),
            stage: Stage::Invocation,
            kind: ErrorKind::Authorization(AuthScope::Downstream),
            reached: WorkflowState::TokenReady,
            source: StageError::Invocation(InvocationError::Unauthorized {
                status: 403,
                body: "denied".to_string(),
            }),
        };

        let value = serde_json::to_value(RunSummary::from(&failure)).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["tenant"], "t1");
        assert_eq!(value["stage"], "invocation");
        assert_eq!(value["kind"], "authorization_error(downstream)");
        assert_eq!(value["reached"], "token_ready");
    }
}
