//! School-side verification of student accounts.
//!
//! Students start in `PENDING`. The administrator of the student's school
//! approves or rejects them and may later reverse that decision. Nothing
//! returns a student to `PENDING`, and students never change their own status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    VerifiedBySchool,
    Rejected,
}

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 3] = [
        VerificationStatus::Pending,
        VerificationStatus::VerifiedBySchool,
        VerificationStatus::Rejected,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "PENDING",
            VerificationStatus::VerifiedBySchool => "VERIFIED_BY_SCHOOL",
            VerificationStatus::Rejected => "REJECTED",
        }
    }

    pub fn allowed_targets(self) -> &'static [VerificationStatus] {
        use VerificationStatus::*;
        match self {
            Pending => &[VerifiedBySchool, Rejected],
            VerifiedBySchool => &[Rejected],
            Rejected => &[VerifiedBySchool],
        }
    }

    /// Validates a move to `target`. Re-asserting the current state is accepted.
    pub fn transition_to(
        self,
        target: VerificationStatus,
    ) -> Result<VerificationStatus, VerificationError> {
        if self == target || self.allowed_targets().contains(&target) {
            Ok(target)
        } else {
            Err(VerificationError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = VerificationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        VerificationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| VerificationError::UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("unknown verification status: {0}")]
    UnknownStatus(String),
    #[error("cannot change verification status from {from} to {to}")]
    InvalidTransition {
        from: VerificationStatus,
        to: VerificationStatus,
    },
}
