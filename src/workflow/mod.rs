//! # Workflow Orchestrator
//!
//! Runs the dynamic credential lifecycle for one tenant:
//!
//! ```text
//! mount -> configure -> declare role -> materialize token -> invoke action
//! ```
//!
//! Each stage hands its result forward and nothing is revisited. The only
//! failure the orchestrator recovers from is a mount that already exists,
//! and only under [`MountConflictPolicy::Reuse`]. Every other failure ends
//! the run with a [`WorkflowFailure`] naming the tenant, the stage and the
//! [`ErrorKind`]. Nothing created before the failure is cleaned up.

pub mod state;

pub use state::{Stage, WorkflowState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::action::{ActionInvoker, ActionRequest, ActionResponse, InvocationError};
use crate::errors::ErrorKind;
use crate::provisioning::{
    EngineAdmin, EngineConfigError, EngineConfigWriter, MountError, PollSchedule, RoleError,
    RoleSpec, RoleWriter, TokenError, TokenMaterializer, DEFAULT_ROLE_NAME,
};
use crate::secrets::{EngineType, MountPath, SecretsBroker, TenantId, Token};

/// What to do when the tenant's mount already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MountConflictPolicy {
    /// Log a warning and carry on with the existing mount.
    #[default]
    Reuse,
    /// Fail the run at the mount stage.
    Abort,
}

/// Knobs for a run that do not change between tenants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub engine: EngineType,
    pub role_name: String,
    pub schedule: PollSchedule,
    pub on_existing_mount: MountConflictPolicy,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            engine: EngineType::gcp(),
            role_name: DEFAULT_ROLE_NAME.to_string(),
            schedule: PollSchedule {
                timeout: Duration::from_secs(60),
                poll_interval: Duration::from_secs(1),
            },
            on_existing_mount: MountConflictPolicy::Reuse,
        }
    }
}

/// Per-run material.
pub struct WorkflowInputs {
    pub tenant: TenantId,
    /// Root credential blob, zeroed once the run drops it.
    pub credentials: Zeroizing<Vec<u8>>,
    pub role_spec: RoleSpec,
    pub action: ActionRequest,
}

impl fmt::Debug for WorkflowInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowInputs")
            .field("tenant", &self.tenant)
            .field("credentials", &format_args!("[REDACTED; {} bytes]", self.credentials.len()))
            .field("role_spec", &self.role_spec)
            .field("action", &self.action)
            .finish()
    }
}

/// The component error that ended a run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Configure(#[from] EngineConfigError),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error("Workflow cancelled")]
    Cancelled,
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Mount(e) => e.kind(),
            StageError::Configure(e) => e.kind(),
            StageError::Role(e) => e.kind(),
            StageError::Token(e) => e.kind(),
            StageError::Invocation(e) => e.kind(),
            StageError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A run that ended before `Done`.
#[derive(thiserror::Error, Debug, Clone)]
#[error("workflow failed for tenant '{tenant}' at stage {stage} ({kind}): {source}")]
pub struct WorkflowFailure {
    pub run_id: Uuid,
    pub tenant: TenantId,
    pub stage: Stage,
    pub kind: ErrorKind,
    /// Last state reached before the failure.
    pub reached: WorkflowState,
    #[source]
    pub source: StageError,
}

impl WorkflowFailure {
    pub fn state(&self) -> WorkflowState {
        WorkflowState::Failed { stage: self.stage, kind: self.kind }
    }
}

/// A run that reached `Done`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub tenant: TenantId,
    pub action: ActionResponse,
    pub token_attempts: u32,
    pub token_wait: Duration,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every state the run passed through, `Init` first.
    pub transitions: Vec<WorkflowState>,
}

impl RunReport {
    pub fn state(&self) -> WorkflowState {
        WorkflowState::Done
    }
}

/// One-shot orchestrator. Consumed by [`Workflow::run`].
pub struct Workflow {
    admin: EngineAdmin,
    config_writer: EngineConfigWriter,
    role_writer: RoleWriter,
    materializer: TokenMaterializer,
    invoker: ActionInvoker,
    settings: WorkflowSettings,
    state: WorkflowState,
    transitions: Vec<WorkflowState>,
}

impl Workflow {
    pub fn new(
        broker: Arc<dyn SecretsBroker>,
        invoker: ActionInvoker,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            admin: EngineAdmin::new(broker.clone()),
            config_writer: EngineConfigWriter::new(broker.clone()),
            role_writer: RoleWriter::new(broker.clone()),
            materializer: TokenMaterializer::new(broker),
            invoker,
            settings,
            state: WorkflowState::Init,
            transitions: vec![WorkflowState::Init],
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Runs every stage for `inputs.tenant`.
    ///
    /// `cancel` is checked before each stage and interrupts the token wait.
    pub async fn run(
        mut self,
        inputs: WorkflowInputs,
        cancel: &CancellationToken,
    ) -> Result<RunReport, WorkflowFailure> {
        let run_id = Uuid::new_v4();
        let span = crate::workflow_span!(run_id, inputs.tenant);
        let started_at = Utc::now();
        let tenant = inputs.tenant.clone();

        async move {
            info!(role = %self.settings.role_name, action = %inputs.action, "Starting credential workflow");

            match self.run_stages(&inputs, cancel).await {
                Ok((action, token_attempts, token_wait)) => {
                    self.advance(&tenant, WorkflowState::Done);
                    info!(status = action.status, token_attempts, "Credential workflow completed");
                    Ok(RunReport {
                        run_id,
                        tenant,
                        action,
                        token_attempts,
                        token_wait,
                        started_at,
                        finished_at: Utc::now(),
                        transitions: self.transitions,
                    })
                }
                Err(source) => {
                    let reached = self.state;
                    // `run_stages` only fails while a stage is pending.
                    let stage = reached.next_stage().unwrap_or(Stage::Invocation);
                    let kind = source.kind();
                    self.advance(&tenant, WorkflowState::Failed { stage, kind });
                    error!(stage = %stage, kind = %kind, error = %source, "Credential workflow failed");
                    Err(WorkflowFailure { run_id, tenant, stage, kind, reached, source })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &mut self,
        inputs: &WorkflowInputs,
        cancel: &CancellationToken,
    ) -> Result<(ActionResponse, u32, Duration), StageError> {
        let tenant = &inputs.tenant;

        ensure_live(cancel)?;
        let mount = self.mount(tenant).await?;
        self.advance(tenant, WorkflowState::Mounted);

        ensure_live(cancel)?;
        self.config_writer.write_engine_config(&mount, &inputs.credentials).await?;
        self.advance(tenant, WorkflowState::Configured);

        ensure_live(cancel)?;
        self.role_writer.write_role(&mount, &self.settings.role_name, &inputs.role_spec).await?;
        self.advance(tenant, WorkflowState::RoleDeclared);

        ensure_live(cancel)?;
        let materialized = self
            .materializer
            .await_token_with_cancel(&mount, &self.settings.role_name, self.settings.schedule, cancel)
            .await?;
        self.advance(tenant, WorkflowState::TokenReady);

        ensure_live(cancel)?;
        let response = self.invoke_once(materialized.token, &inputs.action).await?;
        self.advance(tenant, WorkflowState::ActionInvoked);

        Ok((response, materialized.attempts, materialized.waited))
    }

    async fn mount(&self, tenant: &TenantId) -> Result<MountPath, StageError> {
        match self.admin.mount(tenant, &self.settings.engine).await {
            Ok(mount) => Ok(mount),
            Err(MountError::AlreadyMounted { path })
                if self.settings.on_existing_mount == MountConflictPolicy::Reuse =>
            {
                warn!(mount = %path, "Secrets engine already mounted, reusing it");
                Ok(MountPath::new(&self.settings.engine, tenant))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Takes the token by value so it is dropped, and zeroed, right after use.
    async fn invoke_once(
        &self,
        token: Token,
        request: &ActionRequest,
    ) -> Result<ActionResponse, StageError> {
        let response = self.invoker.invoke(&token, request).await?;
        drop(token);
        Ok(response)
    }

    fn advance(&mut self, tenant: &TenantId, next: WorkflowState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal workflow transition {} -> {}",
            self.state,
            next
        );
        info!(tenant = %tenant, from = %self.state, to = %next, "Workflow state transition");
        self.state = next;
        self.transitions.push(next);
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), StageError> {
    if cancel.is_cancelled() {
        return Err(StageError::Cancelled);
    }
    Ok(())
}
