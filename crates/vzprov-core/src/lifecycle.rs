use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a provisioning run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Start,
    Defaulted,
    Created,
    BaselineConfigured,
    NetworkReconciled,
    Done,
    AbortedEarly,
    Failed,
}

impl ProvisionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProvisionState::Done | ProvisionState::AbortedEarly | ProvisionState::Failed
        )
    }

    /// States reached before the backend was told to create anything.
    pub fn before_create(self) -> bool {
        matches!(self, ProvisionState::Start | ProvisionState::Defaulted)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionState::Start => "start",
            ProvisionState::Defaulted => "defaulted",
            ProvisionState::Created => "created",
            ProvisionState::BaselineConfigured => "baseline_configured",
            ProvisionState::NetworkReconciled => "network_reconciled",
            ProvisionState::Done => "done",
            ProvisionState::AbortedEarly => "aborted_early",
            ProvisionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: ProvisionState, to: ProvisionState) -> Result<(), CoreError> {
    use ProvisionState::{
        AbortedEarly, BaselineConfigured, Created, Defaulted, Done, Failed, NetworkReconciled,
        Start,
    };

    let valid = matches!(
        (from, to),
        (Start, Defaulted | AbortedEarly)
            | (Defaulted, Created | AbortedEarly)
            | (Created, BaselineConfigured | Done)
            | (BaselineConfigured, NetworkReconciled | Done)
            | (NetworkReconciled, Done)
    ) || (to == Failed && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
