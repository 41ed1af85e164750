//! Reimbursement lifecycle.
//!
//! ```text
//!            process              revert_processing
//!   PENDING ─────────▶ PROCESSED ─────────────────▶ PENDING
//!      │
//!      │ refuse
//!      ▼
//!   REFUSED (terminal)
//! ```
//!
//! Besides the three status-changing transitions, some edits are only allowed in certain
//! states: the payment method and amount are frozen once processed, and a reimbursement can
//! only be deleted while pending. [`ReimbursementStatus::apply`] is the single table for all of
//! them.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReimbursementStatus {
    Pending,
    Processed,
    Refused,
}

/// Operations gated by the current status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Process,
    Refuse,
    RevertProcessing,
    ChangeMethod,
    Recalculate,
    Delete,
}

impl Transition {
    fn describe(self) -> &'static str {
        match self {
            Transition::Process => "process",
            Transition::Refuse => "refuse",
            Transition::RevertProcessing => "revert",
            Transition::ChangeMethod => "change the payment method of",
            Transition::Recalculate => "recalculate",
            Transition::Delete => "delete",
        }
    }
}

impl ReimbursementStatus {
    /// Status after `transition`, or [`CoreError::InvalidState`] if it is not allowed from
    /// `self`.
    pub fn apply(self, transition: Transition) -> CoreResult<ReimbursementStatus> {
        use ReimbursementStatus::*;
        use Transition::*;

        let next = match (self, transition) {
            (Pending, Process) => Some(Processed),
            (Pending, Refuse) => Some(Refused),
            (Processed, RevertProcessing) => Some(Pending),
            (Pending | Refused, ChangeMethod | Recalculate) => Some(self),
            (Pending, Delete) => Some(Pending),
            _ => None,
        };

        next.ok_or_else(|| {
            CoreError::InvalidState(format!(
                "cannot {} a {} reimbursement",
                transition.describe(),
                self
            ))
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReimbursementStatus::Pending => "PENDING",
            ReimbursementStatus::Processed => "PROCESSED",
            ReimbursementStatus::Refused => "REFUSED",
        }
    }
}

impl fmt::Display for ReimbursementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReimbursementStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PROCESSED" => Ok(Self::Processed),
            "REFUSED" => Ok(Self::Refused),
            other => Err(CoreError::InvalidArgument(format!(
                "unknown reimbursement status '{other}'"
            ))),
        }
    }
}
