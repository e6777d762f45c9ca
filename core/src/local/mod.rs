//! Local Devnet
//!
//! An in-process stand-in for the audit contract, the FHE coprocessor and the key
//! service. Used by the CLI and the test-suite.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         LocalChain                               │
//! │                                                                  │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐ │
//! │  │   records    │   │ ciphertexts  │   │   faults / counters  │ │
//! │  │  (ordered)   │   │  by handle   │   │                      │ │
//! │  └──────▲───────┘   └──────▲───────┘   └──────────────────────┘ │
//! │         │                  │                                     │
//! │   LocalLedger         LocalGateway                               │
//! │   (contract calls)    (seal / public decrypt via KeyService)     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes land when they are submitted and confirm one block time later.

pub mod gateway;
pub mod ledger;

pub use gateway::LocalGateway;
pub use ledger::LocalLedger;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gridseal_config::LedgerConfig;
use gridseal_fhe::{FheError, Handle, KeyService, NetworkKeys, ProofVerifier, seal_u64};
use gridseal_record::{CiphertextHandle, Identity, RecordId, RecordPublicFields};
use tokio::sync::Mutex;

use crate::ledger::{LedgerError, PendingTx, TxReceipt};

/// Number of calls seen by each devnet entry point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_record: u64,
    pub submit_verification: u64,
    pub encrypt: u64,
    pub request_decryption_proof: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CallCounters {
    pub(crate) create_record: AtomicU64,
    pub(crate) submit_verification: AtomicU64,
    pub(crate) encrypt: AtomicU64,
    pub(crate) request_decryption_proof: AtomicU64,
}

impl CallCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            create_record: self.create_record.load(Ordering::Relaxed),
            submit_verification: self.submit_verification.load(Ordering::Relaxed),
            encrypt: self.encrypt.load(Ordering::Relaxed),
            request_decryption_proof: self.request_decryption_proof.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Faults {
    pub(crate) reject_next_signature: bool,
    pub(crate) fail_next_encryption: bool,
    pub(crate) stall_confirmations: bool,
    pub(crate) revert_next: Option<String>,
    pub(crate) unreadable: HashSet<RecordId>,
}

impl Faults {
    /// Consume a one-shot fault armed for the next signed write.
    pub(crate) fn take_write_fault(&mut self) -> Result<(), LedgerError> {
        if std::mem::take(&mut self.reject_next_signature) {
            return Err(LedgerError::UserRejected);
        }
        if let Some(reason) = self.revert_next.take() {
            return Err(LedgerError::Reverted { reason });
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct ChainState {
    pub(crate) order: Vec<RecordId>,
    pub(crate) records: HashMap<RecordId, RecordPublicFields>,
    pub(crate) ciphertexts: HashMap<Handle, Vec<u8>>,
    pub(crate) available: bool,
    pub(crate) block_number: u64,
    pub(crate) faults: Faults,
}

pub struct LocalChain {
    contract: String,
    kms: KeyService,
    verifier: ProofVerifier,
    block_time: Duration,
    pub(crate) state: Mutex<ChainState>,
    pub(crate) counters: CallCounters,
}

impl LocalChain {
    pub fn new(contract: impl Into<String>, block_time: Duration) -> Self {
        Self::with_keys(contract, block_time, NetworkKeys::generate())
    }

    pub fn with_keys(contract: impl Into<String>, block_time: Duration, keys: NetworkKeys) -> Self {
        let kms = KeyService::new(keys);
        let verifier = kms.verifier();
        Self {
            contract: contract.into(),
            kms,
            verifier,
            block_time,
            state: Mutex::new(ChainState {
                order: Vec::new(),
                records: HashMap::new(),
                ciphertexts: HashMap::new(),
                available: true,
                block_number: 0,
                faults: Faults::default(),
            }),
            counters: CallCounters::default(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.contract_address.clone(),
            Duration::from_millis(config.block_time_ms),
        )
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub(crate) fn kms(&self) -> &KeyService {
        &self.kms
    }

    pub(crate) fn verifier(&self) -> &ProofVerifier {
        &self.verifier
    }

    pub fn counts(&self) -> CallCounts {
        self.counters.snapshot()
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.order.len()
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// The next signed write is refused as if the user declined it.
    pub async fn reject_next_signature(&self) {
        self.state.lock().await.faults.reject_next_signature = true;
    }

    pub async fn fail_next_encryption(&self) {
        self.state.lock().await.faults.fail_next_encryption = true;
    }

    /// Transactions sent while stalled never confirm.
    pub async fn stall_confirmations(&self, stalled: bool) {
        self.state.lock().await.faults.stall_confirmations = stalled;
    }

    /// The next signed write reverts with `reason`.
    pub async fn revert_next(&self, reason: impl Into<String>) {
        self.state.lock().await.faults.revert_next = Some(reason.into());
    }

    pub async fn fail_reads_of(&self, id: &RecordId) {
        self.state.lock().await.faults.unreadable.insert(id.clone());
    }

    pub async fn restore_reads_of(&self, id: &RecordId) {
        self.state.lock().await.faults.unreadable.remove(id);
    }

    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    // ------------------------------------------------------------------
    // Genesis
    // ------------------------------------------------------------------

    /// Insert a record directly, bypassing transactions and counters.
    pub async fn seed_record(
        &self,
        creator: &Identity,
        id: RecordId,
        name: &str,
        usage: u64,
        public_score: u8,
        verified: bool,
    ) -> Result<CiphertextHandle, FheError> {
        let sealed = seal_u64(self.kms.keys(), &self.contract, creator.as_str(), usage)?;
        let handle = CiphertextHandle(sealed.handle);

        let mut state = self.state.lock().await;
        state.ciphertexts.insert(sealed.handle, sealed.ciphertext);
        state.order.push(id.clone());
        state.records.insert(
            id,
            RecordPublicFields {
                name: name.to_string(),
                creator: creator.clone(),
                created_at: crate::unix_now(),
                public_score,
                aux_value: 0,
                label: "Energy Audit Data".to_string(),
                usage_handle: handle,
                verified,
                decrypted_value: if verified { usage } else { 0 },
            },
        );
        Ok(handle)
    }

    pub(crate) fn pending(&self, tx_hash: String, block_number: u64, stalled: bool) -> PendingTx {
        let block_time = self.block_time;
        PendingTx::new(tx_hash.clone(), async move {
            if stalled {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(block_time).await;
            Ok(TxReceipt {
                tx_hash,
                block_number,
            })
        })
    }
}

pub(crate) fn tx_hash(block_number: u64, method: &str, id: &RecordId) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&block_number.to_le_bytes());
    hasher.update(method.as_bytes());
    hasher.update(id.as_str().as_bytes());
    format!("0x{}", hex::encode(hasher.finalize().as_bytes()))
}
