//! Sealed Inputs
//!
//! A client seals a plaintext integer before it leaves the process. The sealed
//! blob is stored on-chain and referenced by its handle; the input proof binds the
//! handle to the target contract and the submitting account.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::FheError;
use crate::keys::{NetworkKeys, ProofVerifier};

/// Opaque ciphertext handle
pub type Handle = [u8; 32];

const NONCE_LEN: usize = 12;

/// A sealed value ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedInput {
    /// Handle of the ciphertext (hash of nonce and ciphertext)
    pub handle: Handle,
    /// Nonce followed by the ChaCha20-Poly1305 ciphertext
    pub ciphertext: Vec<u8>,
    /// Attestation over (contract, owner, handle)
    pub input_proof: Vec<u8>,
}

impl SealedInput {
    /// Compute the handle of a sealed blob
    pub fn compute_handle(ciphertext: &[u8]) -> Handle {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"gridseal-handle-v1");
        hasher.update(ciphertext);
        *hasher.finalize().as_bytes()
    }
}

/// Seal `value` for `contract`, owned by `owner`
pub fn seal_u64(
    keys: &NetworkKeys,
    contract: &str,
    owner: &str,
    value: u64,
) -> Result<SealedInput, FheError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher =
        ChaCha20Poly1305::new_from_slice(keys.sealing_key()).map_err(|_| FheError::SealingFailed)?;
    let sealed = cipher
        .encrypt(nonce, value.to_be_bytes().as_slice())
        .map_err(|_| FheError::SealingFailed)?;

    let mut ciphertext = Vec::with_capacity(NONCE_LEN + sealed.len());
    ciphertext.extend_from_slice(&nonce_bytes);
    ciphertext.extend_from_slice(&sealed);

    let handle = SealedInput::compute_handle(&ciphertext);
    let input_proof = keys.attest(&input_message(contract, owner, &handle));

    Ok(SealedInput {
        handle,
        ciphertext,
        input_proof,
    })
}

/// Check that a sealed input was attested for this contract and owner
pub fn verify_input_proof(
    verifier: &ProofVerifier,
    contract: &str,
    owner: &str,
    handle: &Handle,
    ciphertext: &[u8],
    input_proof: &[u8],
) -> Result<(), FheError> {
    if SealedInput::compute_handle(ciphertext) != *handle {
        return Err(FheError::InvalidInputProof);
    }
    verifier.check(
        &input_message(contract, owner, handle),
        input_proof,
        FheError::InvalidInputProof,
    )
}

pub(crate) fn unseal_u64(keys: &NetworkKeys, ciphertext: &[u8]) -> Result<u64, FheError> {
    if ciphertext.len() <= NONCE_LEN {
        return Err(FheError::UnsealingFailed);
    }
    let (nonce_bytes, sealed) = ciphertext.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new_from_slice(keys.sealing_key())
        .map_err(|_| FheError::UnsealingFailed)?;
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), sealed)
        .map_err(|_| FheError::UnsealingFailed)?;

    let bytes: [u8; 8] = plain
        .as_slice()
        .try_into()
        .map_err(|_| FheError::UnsealingFailed)?;
    Ok(u64::from_be_bytes(bytes))
}

fn input_message(contract: &str, owner: &str, handle: &Handle) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"gridseal-input-v1");
    hasher.update(&(contract.len() as u64).to_le_bytes());
    hasher.update(contract.as_bytes());
    hasher.update(&(owner.len() as u64).to_le_bytes());
    hasher.update(owner.as_bytes());
    hasher.update(handle);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";
    const OWNER: &str = "0x00000000000000000000000000000000000000b1";

    #[test]
    fn test_seal_and_unseal() {
        let keys = NetworkKeys::from_seed(b"test");
        let sealed = seal_u64(&keys, CONTRACT, OWNER, 500).unwrap();

        assert!(!sealed.ciphertext.is_empty());
        assert!(!sealed.input_proof.is_empty());
        assert_eq!(sealed.handle, SealedInput::compute_handle(&sealed.ciphertext));
        assert_eq!(unseal_u64(&keys, &sealed.ciphertext).unwrap(), 500);
    }

    #[test]
    fn test_same_value_seals_differently() {
        let keys = NetworkKeys::from_seed(b"test");
        let a = seal_u64(&keys, CONTRACT, OWNER, 7).unwrap();
        let b = seal_u64(&keys, CONTRACT, OWNER, 7).unwrap();
        assert_ne!(a.handle, b.handle);
    }

    #[test]
    fn test_input_proof_binds_contract_and_owner() {
        let keys = NetworkKeys::from_seed(b"test");
        let verifier = keys.verifier();
        let sealed = seal_u64(&keys, CONTRACT, OWNER, 42).unwrap();

        let check = |contract: &str, owner: &str| {
            verify_input_proof(
                &verifier,
                contract,
                owner,
                &sealed.handle,
                &sealed.ciphertext,
                &sealed.input_proof,
            )
        };

        assert!(check(CONTRACT, OWNER).is_ok());
        assert_eq!(check("0xdead", OWNER), Err(FheError::InvalidInputProof));
        assert_eq!(check(CONTRACT, "0xbeef"), Err(FheError::InvalidInputProof));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let keys = NetworkKeys::from_seed(b"test");
        let mut sealed = seal_u64(&keys, CONTRACT, OWNER, 42).unwrap();
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0xff;

        let result = verify_input_proof(
            &keys.verifier(),
            CONTRACT,
            OWNER,
            &sealed.handle,
            &sealed.ciphertext,
            &sealed.input_proof,
        );
        assert_eq!(result, Err(FheError::InvalidInputProof));
        assert_eq!(
            unseal_u64(&keys, &sealed.ciphertext),
            Err(FheError::UnsealingFailed)
        );
    }
}
