//! Gridseal Core
//!
//! Confidential record lifecycle for FHE-backed energy audits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         AuditClient                                  │
//! │                                                                      │
//! │  ┌──────────────────────┐        ┌──────────────────────────────┐   │
//! │  │ SubmissionOrchestrator│       │   DecryptionOrchestrator     │   │
//! │  └──────────┬───────────┘        └──────────────┬───────────────┘   │
//! │             │                                   │                    │
//! │             ├──────────────┬────────────────────┤                    │
//! │             ▼              ▼                    ▼                    │
//! │      CryptoGateway    LedgerClient        StatusReporter             │
//! │                            │                                         │
//! │                            ▼                                         │
//! │                       RecordStore  (refreshed after every write)     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod gateway;
pub mod history;
pub mod identity;
pub mod ledger;
pub mod local;
pub mod machine;
pub mod reveal;
pub mod status;
pub mod store;
pub mod submit;

pub use client::AuditClient;
pub use error::{LoadError, RevealError, SubmitError};
pub use gateway::{CryptoGateway, DecryptionResult, EncryptedInput, GatewayError, ProofSubmitter};
pub use history::{Activity, ActivityKind, ActivityLog};
pub use identity::{IdentityProvider, SessionGuard, WalletSession};
pub use ledger::{CreateRecordCall, LedgerClient, LedgerError, PendingTx, TxReceipt};
pub use local::{CallCounts, LocalChain, LocalGateway, LocalLedger};
pub use reveal::{DecryptionOrchestrator, RevealPhase};
pub use status::{Status, StatusKind, StatusReporter, StatusUpdate};
pub use store::{RecordStore, Snapshot, Summary};
pub use submit::{SubmissionOrchestrator, SubmitPhase, SubmitSettings};

pub(crate) fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests;
