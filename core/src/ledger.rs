//! Ledger Client
//!
//! Read queries and signed writes against the audit contract. Every write hands
//! back a [`PendingTx`] that must be confirmed before the write counts as durable.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use gridseal_record::{CiphertextHandle, Identity, RecordId, RecordPublicFields};
use thiserror::Error;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("user rejected the request")]
    UserRejected,

    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no confirmation within {0:?}")]
    Timeout(Duration),
}

impl LedgerError {
    /// Classify an untyped provider error message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            LedgerError::UserRejected
        } else if let Some((_, reason)) = message.split_once("execution reverted:") {
            LedgerError::Reverted {
                reason: reason.trim().to_string(),
            }
        } else {
            LedgerError::Transport(message)
        }
    }

    /// The contract refused a verification because the record is already verified.
    pub fn is_already_verified(&self) -> bool {
        match self {
            LedgerError::Reverted { reason } | LedgerError::Transport(reason) => {
                reason.to_lowercase().contains("already verified")
            }
            _ => false,
        }
    }
}

/// Confirmation of an included transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
}

/// A submitted, not yet confirmed transaction
pub struct PendingTx {
    tx_hash: String,
    confirmation: BoxFuture<'static, Result<TxReceipt, LedgerError>>,
}

impl PendingTx {
    pub fn new(
        tx_hash: impl Into<String>,
        confirmation: impl Future<Output = Result<TxReceipt, LedgerError>> + Send + 'static,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            confirmation: Box::pin(confirmation),
        }
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    /// Wait for inclusion, giving up after `timeout`.
    pub async fn confirm(self, timeout: Duration) -> Result<TxReceipt, LedgerError> {
        match tokio::time::timeout(timeout, self.confirmation).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Timeout(timeout)),
        }
    }
}

impl fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTx")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Arguments of the contract's `createRecord` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRecordCall {
    pub id: RecordId,
    pub name: String,
    pub cipher_blob: Vec<u8>,
    pub input_proof: Vec<u8>,
    pub public_score: u8,
    pub aux_flag: u64,
    pub label: String,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the audit contract, used as the encryption target.
    fn contract_address(&self) -> &str;

    async fn list_record_ids(&self) -> Result<Vec<RecordId>, LedgerError>;

    async fn get_record(&self, id: &RecordId) -> Result<RecordPublicFields, LedgerError>;

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, LedgerError>;

    async fn is_service_available(&self) -> Result<bool, LedgerError>;

    async fn create_record(
        &self,
        signer: &Identity,
        call: CreateRecordCall,
    ) -> Result<PendingTx, LedgerError>;

    async fn submit_verification(
        &self,
        signer: &Identity,
        id: &RecordId,
        encoded_clear_values: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<PendingTx, LedgerError>;
}
