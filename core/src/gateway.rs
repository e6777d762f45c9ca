//! Crypto Gateway
//!
//! Encryption of inputs and the two-phase public decryption protocol. The gateway
//! never talks to the ledger itself: the caller injects a [`ProofSubmitter`] that
//! knows how to put the decryption proof on-chain.

use std::collections::HashMap;

use async_trait::async_trait;
use gridseal_record::{CiphertextHandle, Identity};
use thiserror::Error;

use crate::ledger::{BoxFuture, LedgerError, TxReceipt};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption proof failed: {0}")]
    Proof(String),

    #[error("proof submission failed: {0}")]
    Submission(#[source] LedgerError),
}

/// A sealed input ready for `createRecord`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: CiphertextHandle,
    pub cipher_blob: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Outcome of a completed public decryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionResult {
    pub clear_values: HashMap<CiphertextHandle, u64>,
    pub encoded_clear_values: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Puts `(encoded_clear_values, proof)` on-chain and waits for confirmation.
pub type ProofSubmitter =
    Box<dyn FnOnce(Vec<u8>, Vec<u8>) -> BoxFuture<'static, Result<TxReceipt, LedgerError>> + Send>;

#[async_trait]
pub trait CryptoGateway: Send + Sync {
    async fn encrypt(
        &self,
        target: &str,
        owner: &Identity,
        plain: u64,
    ) -> Result<EncryptedInput, GatewayError>;

    /// Decrypt `handles`, hand the proof to `submit` and return the clear values
    /// once the submission has confirmed.
    async fn request_decryption_proof(
        &self,
        handles: &[CiphertextHandle],
        target: &str,
        submit: ProofSubmitter,
    ) -> Result<DecryptionResult, GatewayError>;
}
