//! Execution State Machine

use serde::{Deserialize, Serialize};

/// Automation level governing whether trades wait for approval
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Informational only; nothing is stored or executed
    AdvisoryOnly,
    #[default]
    ApprovalRequired,
    FullyAutomated,
}

impl ExecutionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdvisoryOnly => "advisory_only",
            Self::ApprovalRequired => "approval_required",
            Self::FullyAutomated => "fully_automated",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Drafted,
    PendingApproval,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl ExecutionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Executed | Self::Failed)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Drafted, Self::PendingApproval | Self::Approved)
                | (Self::PendingApproval, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Executed | Self::Failed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drafted => "drafted",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Executed => "executed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
