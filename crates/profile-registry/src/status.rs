//! Profile lifecycle.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review status of a creator profile.
///
/// `Pending` is the only non-terminal state; records written without a
/// status deserialize as `Pending`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Submitted, awaiting review
    #[default]
    Pending,
    /// Accepted by the owner
    Verified,
    /// Turned down by the owner
    Rejected,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::Verified, Status::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Verified => "verified",
            Status::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Pending)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Verified) | (Status::Pending, Status::Rejected)
        )
    }

    /// Validate a transition, returning the new state.
    ///
    /// Re-applying the current state is rejected like any other illegal move.
    pub fn transition(self, next: Status) -> Result<Status, RegistryError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RegistryError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "verified" => Ok(Status::Verified),
            "rejected" => Ok(Status::Rejected),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}
