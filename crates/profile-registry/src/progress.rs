//! Operation progress published to UI collaborators.

use crate::error::RegistryError;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// User-facing operations that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Verify,
    Reject,
    Decrypt,
}

impl Operation {
    /// Message shown while the operation runs.
    pub fn pending_message(&self) -> &'static str {
        match self {
            Operation::Create => "Encrypting creator data...",
            Operation::Verify | Operation::Reject => "Processing encrypted data...",
            Operation::Decrypt => "Requesting signature to decrypt...",
        }
    }

    /// Message shown on success.
    pub fn success_message(&self) -> &'static str {
        match self {
            Operation::Create => "Creator profile submitted securely!",
            Operation::Verify => "Verification completed successfully!",
            Operation::Reject => "Rejection completed successfully!",
            Operation::Decrypt => "Values decrypted",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            Operation::Create => "Submission failed",
            Operation::Verify => "Verification failed",
            Operation::Reject => "Rejection failed",
            Operation::Decrypt => "Decryption failed",
        }
    }

    /// Message shown on failure.
    pub fn failure_message(&self, kind: FailureKind, reason: &str) -> String {
        match kind {
            FailureKind::Declined => "Transaction rejected by user".to_string(),
            FailureKind::System => format!("{}: {}", self.failure_prefix(), reason),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Verify => "verify",
            Operation::Reject => "reject",
            Operation::Decrypt => "decrypt",
        };
        f.write_str(name)
    }
}

/// Whether a failure came from the user declining or from the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Declined,
    System,
}

impl FailureKind {
    pub fn of(error: &RegistryError) -> Self {
        if error.is_declined() {
            FailureKind::Declined
        } else {
            FailureKind::System
        }
    }
}

/// Latest state of the most recent operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OperationStatus {
    Idle,
    InProgress {
        operation: Operation,
    },
    Succeeded {
        operation: Operation,
    },
    Failed {
        operation: Operation,
        reason: String,
        kind: FailureKind,
    },
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded { .. } | OperationStatus::Failed { .. }
        )
    }

    /// Human-readable message for the current state.
    pub fn message(&self) -> String {
        match self {
            OperationStatus::Idle => String::new(),
            OperationStatus::InProgress { operation } => operation.pending_message().to_string(),
            OperationStatus::Succeeded { operation } => operation.success_message().to_string(),
            OperationStatus::Failed {
                operation,
                reason,
                kind,
            } => operation.failure_message(*kind, reason),
        }
    }
}

/// Publishes operation status on a watch channel.
///
/// Subscribers see the latest state; intermediate states may be skipped by
/// slow readers.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<OperationStatus>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(OperationStatus::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> OperationStatus {
        self.tx.borrow().clone()
    }

    pub fn started(&self, operation: Operation) {
        self.tx.send_replace(OperationStatus::InProgress { operation });
    }

    pub fn succeeded(&self, operation: Operation) {
        self.tx.send_replace(OperationStatus::Succeeded { operation });
    }

    pub fn failed(&self, operation: Operation, reason: impl Into<String>, kind: FailureKind) {
        self.tx.send_replace(OperationStatus::Failed {
            operation,
            reason: reason.into(),
            kind,
        });
    }

    /// Publish the terminal state for `result` and hand it back.
    pub fn finish<T>(
        &self,
        operation: Operation,
        result: Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        match &result {
            Ok(_) => self.succeeded(operation),
            Err(e) => self.failed(operation, e.to_string(), FailureKind::of(e)),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_client::LedgerError;

    #[test]
    fn test_messages() {
        assert_eq!(
            Operation::Create.pending_message(),
            "Encrypting creator data..."
        );
        assert_eq!(
            Operation::Create.failure_message(FailureKind::Declined, "ignored"),
            "Transaction rejected by user"
        );
        assert_eq!(
            Operation::Create.failure_message(FailureKind::System, "timeout"),
            "Submission failed: timeout"
        );
        assert_eq!(
            Operation::Verify.failure_message(FailureKind::System, "x"),
            "Verification failed: x"
        );
    }

    #[test]
    fn test_failure_kind() {
        let declined = RegistryError::Ledger(LedgerError::Declined);
        let system = RegistryError::NotFound("a".into());
        assert_eq!(FailureKind::of(&declined), FailureKind::Declined);
        assert_eq!(FailureKind::of(&system), FailureKind::System);
    }

    #[test]
    fn test_tracker_publishes_latest_state() {
        let tracker = ProgressTracker::new();
        let rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), OperationStatus::Idle);

        tracker.started(Operation::Verify);
        assert_eq!(
            *rx.borrow(),
            OperationStatus::InProgress {
                operation: Operation::Verify
            }
        );

        let result: Result<(), _> = tracker.finish(
            Operation::Verify,
            Err(RegistryError::Ledger(LedgerError::Declined)),
        );
        assert!(result.is_err());
        assert!(tracker.current().is_terminal());
        assert_eq!(tracker.current().message(), "Transaction rejected by user");
    }

    #[test]
    fn test_send_without_subscribers() {
        let tracker = ProgressTracker::new();
        tracker.started(Operation::Create);
        tracker.succeeded(Operation::Create);
        assert_eq!(
            tracker.current().message(),
            "Creator profile submitted securely!"
        );
    }

    #[test]
    fn test_status_serializes_with_tag() {
        let status = OperationStatus::Failed {
            operation: Operation::Reject,
            reason: "boom".into(),
            kind: FailureKind::System,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["operation"], "reject");
        assert_eq!(json["kind"], "system");
    }
}
