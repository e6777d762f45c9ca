use std::time::Duration;

use gridseal_record::{RecordId, ValidationError};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::ledger::LedgerError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to list records: {0}")]
    List(#[source] LedgerError),

    #[error("failed to read record {id}: {source}")]
    Read { id: RecordId, source: LedgerError },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("wallet not connected")]
    NotConnected,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("transaction rejected by user")]
    Rejected,

    #[error("chain error: {0}")]
    Chain(String),

    #[error("no confirmation within {0:?}")]
    Timeout(Duration),

    #[error("wallet disconnected")]
    Disconnected,
}

impl From<LedgerError> for SubmitError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UserRejected => SubmitError::Rejected,
            LedgerError::Timeout(after) => SubmitError::Timeout(after),
            other => SubmitError::Chain(other.to_string()),
        }
    }
}

impl From<GatewayError> for SubmitError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Submission(ledger) => ledger.into(),
            GatewayError::Encryption(msg) | GatewayError::Proof(msg) => SubmitError::Encryption(msg),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RevealError {
    #[error("wallet not connected")]
    NotConnected,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("transaction rejected by user")]
    Rejected,

    #[error("proof error: {0}")]
    Proof(String),

    #[error("chain error: {0}")]
    Chain(String),

    #[error("no confirmation within {0:?}")]
    Timeout(Duration),

    #[error("wallet disconnected")]
    Disconnected,
}

impl From<LedgerError> for RevealError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UserRejected => RevealError::Rejected,
            LedgerError::Timeout(after) => RevealError::Timeout(after),
            other => RevealError::Chain(other.to_string()),
        }
    }
}

impl From<GatewayError> for RevealError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Submission(ledger) => ledger.into(),
            GatewayError::Encryption(msg) | GatewayError::Proof(msg) => RevealError::Proof(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_taxonomy() {
        assert_eq!(
            SubmitError::from(LedgerError::UserRejected),
            SubmitError::Rejected
        );
        assert_eq!(
            RevealError::from(LedgerError::Timeout(Duration::from_secs(3))),
            RevealError::Timeout(Duration::from_secs(3))
        );
        assert!(matches!(
            RevealError::from(LedgerError::Reverted {
                reason: "Invalid decryption proof".to_string()
            }),
            RevealError::Chain(msg) if msg.contains("Invalid decryption proof")
        ));
    }

    #[test]
    fn test_gateway_submission_failure_keeps_ledger_kind() {
        let err = GatewayError::Submission(LedgerError::UserRejected);
        assert_eq!(RevealError::from(err), RevealError::Rejected);

        let err = GatewayError::Proof("unknown handle".to_string());
        assert_eq!(
            RevealError::from(err),
            RevealError::Proof("unknown handle".to_string())
        );
    }
}
