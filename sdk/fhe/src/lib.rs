//! Gridseal FHE stand-in
//!
//! Local replacement for the FHE coprocessor and key-management service used by the
//! devnet backend. It mirrors the shape of the real protocol without implementing
//! homomorphic arithmetic.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Confidential Value Flow                         │
//! │                                                                  │
//! │  1. Client               2. Contract              3. Key Service │
//! │  ┌──────────┐           ┌──────────────┐         ┌────────────┐ │
//! │  │  Seal    │──handle + │  Check input │──handle▶│  Decrypt + │ │
//! │  │  u64     │  proof   ▶│  proof       │         │  attest    │ │
//! │  └──────────┘           └──────────────┘         └────────────┘ │
//! │                                ▲                        │        │
//! │                                └── clear values + proof ┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod decrypt;
pub mod input;
pub mod keys;

pub use decrypt::{
    KeyService, PublicDecryption, decode_clear_values, encode_clear_values,
    verify_decryption_proof,
};
pub use input::{Handle, SealedInput, seal_u64, verify_input_proof};
pub use keys::{NetworkKeys, ProofVerifier};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FheError {
    #[error("sealing failed")]
    SealingFailed,

    #[error("unsealing failed")]
    UnsealingFailed,

    #[error("invalid input proof")]
    InvalidInputProof,

    #[error("invalid decryption proof")]
    InvalidDecryptionProof,

    #[error("malformed clear values: {0} bytes is not a whole number of words")]
    MalformedClearValues(usize),

    #[error("clear value does not fit in 64 bits")]
    ClearValueOverflow,

    #[error("unknown handle {0}")]
    UnknownHandle(String),
}
