//! Company-side status pipeline for applications.
//!
//! Statuses only move forward: `APPLIED -> VIEWED -> INTERVIEW` and from any
//! open status to one of the terminal outcomes `ACCEPTED` or `REJECTED`.
//! Stages may be skipped. Assigning the current status again is a no-op.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Applied,
    Viewed,
    Interview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Viewed,
        ApplicationStatus::Interview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Viewed => "VIEWED",
            ApplicationStatus::Interview => "INTERVIEW",
            ApplicationStatus::Accepted => "ACCEPTED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn allowed_targets(self) -> &'static [ApplicationStatus] {
        use ApplicationStatus::*;
        match self {
            Applied => &[Viewed, Interview, Accepted, Rejected],
            Viewed => &[Interview, Accepted, Rejected],
            Interview => &[Accepted, Rejected],
            Accepted | Rejected => &[],
        }
    }

    pub fn transition_to(
        self,
        target: ApplicationStatus,
    ) -> Result<ApplicationStatus, PipelineError> {
        if self == target || self.allowed_targets().contains(&target) {
            Ok(target)
        } else {
            Err(PipelineError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }

    /// Status after the owning company opens the application.
    pub fn on_viewed(self) -> ApplicationStatus {
        match self {
            ApplicationStatus::Applied => ApplicationStatus::Viewed,
            other => other,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| PipelineError::UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("unknown application status: {0}")]
    UnknownStatus(String),
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}
