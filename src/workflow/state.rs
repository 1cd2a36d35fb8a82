//! Workflow state machine.

use serde::Serialize;
use std::fmt;

use crate::errors::ErrorKind;

/// Step of the workflow that was executing when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Mount,
    Configure,
    DeclareRole,
    MaterializeToken,
    Invocation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Mount => "mount",
            Stage::Configure => "configure",
            Stage::DeclareRole => "declare_role",
            Stage::MaterializeToken => "materialize_token",
            Stage::Invocation => "invocation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run is.
///
/// Progress is strictly linear:
/// `Init -> Mounted -> Configured -> RoleDeclared -> TokenReady -> ActionInvoked -> Done`.
/// `Failed` can be entered from any state that is not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Mounted,
    Configured,
    RoleDeclared,
    TokenReady,
    ActionInvoked,
    Done,
    Failed { stage: Stage, kind: ErrorKind },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed { .. })
    }

    /// The stage that moves a run out of this state, if any.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            WorkflowState::Init => Some(Stage::Mount),
            WorkflowState::Mounted => Some(Stage::Configure),
            WorkflowState::Configured => Some(Stage::DeclareRole),
            WorkflowState::RoleDeclared => Some(Stage::MaterializeToken),
            WorkflowState::TokenReady => Some(Stage::Invocation),
            WorkflowState::ActionInvoked | WorkflowState::Done | WorkflowState::Failed { .. } => {
                None
            }
        }
    }

    pub fn can_transition_to(&self, next: &WorkflowState) -> bool {
        use WorkflowState::*;

        match (self, next) {
            (Done, _) | (Failed { .. }, _) => false,
            (_, Failed { .. }) => true,
            (Init, Mounted)
            | (Mounted, Configured)
            | (Configured, RoleDeclared)
            | (RoleDeclared, TokenReady)
            | (TokenReady, ActionInvoked)
            | (ActionInvoked, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Init => f.write_str("init"),
            WorkflowState::Mounted => f.write_str("mounted"),
            WorkflowState::Configured => f.write_str("configured"),
            WorkflowState::RoleDeclared => f.write_str("role_declared"),
            WorkflowState::TokenReady => f.write_str("token_ready"),
            WorkflowState::ActionInvoked => f.write_str("action_invoked"),
            WorkflowState::Done => f.write_str("done"),
            WorkflowState::Failed { stage, kind } => write!(f, "failed({}, {})", stage, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthScope;

    const HAPPY_PATH: [WorkflowState; 7] = [
        WorkflowState::Init,
        WorkflowState::Mounted,
        WorkflowState::Configured,
        WorkflowState::RoleDeclared,
        WorkflowState::TokenReady,
        WorkflowState::ActionInvoked,
        WorkflowState::Done,
    ];

    #[test]
    fn test_happy_path_is_linear() {
        for pair in HAPPY_PATH.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(&pair[0]), "{} -> {}", pair[1], pair[0]);
        }
        assert!(!WorkflowState::Init.can_transition_to(&WorkflowState::Configured));
        assert!(!WorkflowState::Mounted.can_transition_to(&WorkflowState::TokenReady));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        let failed = WorkflowState::Failed { stage: Stage::Mount, kind: ErrorKind::Transport };
        for state in &HAPPY_PATH[..6] {
            assert!(state.can_transition_to(&failed));
        }
        assert!(!WorkflowState::Done.can_transition_to(&failed));
        assert!(!failed.can_transition_to(&WorkflowState::Init));
        assert!(failed.is_terminal());
    }

    #[test]
    fn test_display() {
        let failed = WorkflowState::Failed {
            stage: Stage::Invocation,
            kind: ErrorKind::Authorization(AuthScope::Downstream),
        };
        assert_eq!(failed.to_string(), "failed(invocation, authorization_error(downstream))");
        assert_eq!(WorkflowState::RoleDeclared.to_string(), "role_declared");
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(WorkflowState::Init.next_stage(), Some(Stage::Mount));
        assert_eq!(WorkflowState::TokenReady.next_stage(), Some(Stage::Invocation));
        assert_eq!(WorkflowState::ActionInvoked.next_stage(), None);
    }
}
