//! Network Keys
//!
//! Key material held by the key service: a symmetric sealing key for values and an
//! Ed25519 attestation key whose public half is registered with the contract.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;

use crate::FheError;

/// Secret key material of the local key service
#[derive(Clone)]
pub struct NetworkKeys {
    sealing_key: [u8; 32],
    signing_key: SigningKey,
}

impl NetworkKeys {
    /// Generate fresh random keys
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut sealing_key = [0u8; 32];
        let mut signing_seed = [0u8; 32];
        rng.fill_bytes(&mut sealing_key);
        rng.fill_bytes(&mut signing_seed);

        Self {
            sealing_key,
            signing_key: SigningKey::from_bytes(&signing_seed),
        }
    }

    /// Derive keys deterministically from a seed (tests and reproducible devnets)
    pub fn from_seed(seed: &[u8]) -> Self {
        let sealing_key = blake3::derive_key("gridseal-fhe-v1 sealing", seed);
        let signing_seed = blake3::derive_key("gridseal-fhe-v1 attestation", seed);

        Self {
            sealing_key,
            signing_key: SigningKey::from_bytes(&signing_seed),
        }
    }

    pub(crate) fn sealing_key(&self) -> &[u8; 32] {
        &self.sealing_key
    }

    pub(crate) fn attest(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Public verifier to register with the contract
    pub fn verifier(&self) -> ProofVerifier {
        ProofVerifier {
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

impl std::fmt::Debug for NetworkKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkKeys")
            .field("verifying_key", &hex::encode(self.signing_key.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verifies attestations produced by [`NetworkKeys`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofVerifier {
    verifying_key: VerifyingKey,
}

impl ProofVerifier {
    pub(crate) fn check(&self, message: &[u8], proof: &[u8], err: FheError) -> Result<(), FheError> {
        let signature = Signature::from_slice(proof).map_err(|_| err.clone())?;
        self.verifying_key.verify(message, &signature).map_err(|_| err)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.verifying_key.as_bytes()
    }
}
