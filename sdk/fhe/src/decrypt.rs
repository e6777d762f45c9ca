//! Public Decryption
//!
//! The key service decrypts a set of handles and attests to the result. The
//! attestation covers the contract, the ordered handles and the encoded clear
//! values, so the contract can accept the values without trusting the caller.

use serde::{Deserialize, Serialize};

use crate::FheError;
use crate::input::{Handle, unseal_u64};
use crate::keys::{NetworkKeys, ProofVerifier};

const WORD: usize = 32;

/// Result of a public decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicDecryption {
    /// Handles in request order
    pub handles: Vec<Handle>,
    /// Clear values, parallel to `handles`
    pub clear_values: Vec<u64>,
    /// ABI-style encoding of `clear_values`
    pub encoded: Vec<u8>,
    /// Attestation over (contract, handles, encoded)
    pub proof: Vec<u8>,
}

/// Local key-management service
#[derive(Debug, Clone)]
pub struct KeyService {
    keys: NetworkKeys,
}

impl KeyService {
    pub fn new(keys: NetworkKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &NetworkKeys {
        &self.keys
    }

    pub fn verifier(&self) -> ProofVerifier {
        self.keys.verifier()
    }

    /// Decrypt `ciphertexts` (handle, blob) and attest to the clear values
    pub fn public_decrypt(
        &self,
        contract: &str,
        ciphertexts: &[(Handle, Vec<u8>)],
    ) -> Result<PublicDecryption, FheError> {
        let mut handles = Vec::with_capacity(ciphertexts.len());
        let mut clear_values = Vec::with_capacity(ciphertexts.len());

        for (handle, blob) in ciphertexts {
            handles.push(*handle);
            clear_values.push(unseal_u64(&self.keys, blob)?);
        }

        let encoded = encode_clear_values(&clear_values);
        let proof = self
            .keys
            .attest(&decryption_message(contract, &handles, &encoded));

        Ok(PublicDecryption {
            handles,
            clear_values,
            encoded,
            proof,
        })
    }
}

/// Encode values as 32-byte big-endian words
pub fn encode_clear_values(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * WORD);
    for value in values {
        let mut word = [0u8; WORD];
        word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
        out.extend_from_slice(&word);
    }
    out
}

/// Decode 32-byte big-endian words back into values
pub fn decode_clear_values(encoded: &[u8]) -> Result<Vec<u64>, FheError> {
    if encoded.len() % WORD != 0 {
        return Err(FheError::MalformedClearValues(encoded.len()));
    }

    encoded
        .chunks_exact(WORD)
        .map(|word| {
            let (high, low) = word.split_at(WORD - 8);
            if high.iter().any(|b| *b != 0) {
                return Err(FheError::ClearValueOverflow);
            }
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(low);
            Ok(u64::from_be_bytes(bytes))
        })
        .collect()
}

/// Check a decryption attestation
pub fn verify_decryption_proof(
    verifier: &ProofVerifier,
    contract: &str,
    handles: &[Handle],
    encoded: &[u8],
    proof: &[u8],
) -> Result<(), FheError> {
    verifier.check(
        &decryption_message(contract, handles, encoded),
        proof,
        FheError::InvalidDecryptionProof,
    )
}

fn decryption_message(contract: &str, handles: &[Handle], encoded: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"gridseal-decryption-v1");
    hasher.update(&(contract.len() as u64).to_le_bytes());
    hasher.update(contract.as_bytes());
    hasher.update(&(handles.len() as u64).to_le_bytes());
    for handle in handles {
        hasher.update(handle);
    }
    hasher.update(encoded);
    *hasher.finalize().as_bytes()
}
