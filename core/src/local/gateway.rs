use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gridseal_fhe::{FheError, seal_u64};
use gridseal_record::{CiphertextHandle, Identity};

use super::{CallCounters, LocalChain};
use crate::gateway::{
    CryptoGateway, DecryptionResult, EncryptedInput, GatewayError, ProofSubmitter,
};

/// [`CryptoGateway`] backed by the devnet key service
#[derive(Clone)]
pub struct LocalGateway {
    chain: Arc<LocalChain>,
}

impl LocalGateway {
    pub fn new(chain: Arc<LocalChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl CryptoGateway for LocalGateway {
    async fn encrypt(
        &self,
        target: &str,
        owner: &Identity,
        plain: u64,
    ) -> Result<EncryptedInput, GatewayError> {
        CallCounters::bump(&self.chain.counters.encrypt);
        if std::mem::take(&mut self.chain.state.lock().await.faults.fail_next_encryption) {
            return Err(GatewayError::Encryption(
                "coprocessor unavailable".to_string(),
            ));
        }

        let sealed = seal_u64(self.chain.kms().keys(), target, owner.as_str(), plain)
            .map_err(|e| GatewayError::Encryption(e.to_string()))?;

        Ok(EncryptedInput {
            handle: CiphertextHandle(sealed.handle),
            cipher_blob: sealed.ciphertext,
            proof: sealed.input_proof,
        })
    }

    async fn request_decryption_proof(
        &self,
        handles: &[CiphertextHandle],
        target: &str,
        submit: ProofSubmitter,
    ) -> Result<DecryptionResult, GatewayError> {
        CallCounters::bump(&self.chain.counters.request_decryption_proof);

        let ciphertexts = {
            let state = self.chain.state.lock().await;
            handles
                .iter()
                .map(|h| {
                    state
                        .ciphertexts
                        .get(&h.0)
                        .map(|blob| (h.0, blob.clone()))
                        .ok_or_else(|| {
                            GatewayError::Proof(FheError::UnknownHandle(h.to_hex()).to_string())
                        })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let decryption = self
            .chain
            .kms()
            .public_decrypt(target, &ciphertexts)
            .map_err(|e| GatewayError::Proof(e.to_string()))?;

        log::debug!(
            "public decryption of {} handle(s) attested, handing proof to submitter",
            decryption.handles.len()
        );
        submit(decryption.encoded.clone(), decryption.proof.clone())
            .await
            .map_err(GatewayError::Submission)?;

        let clear_values: HashMap<CiphertextHandle, u64> = decryption
            .handles
            .iter()
            .zip(&decryption.clear_values)
            .map(|(h, v)| (CiphertextHandle(*h), *v))
            .collect();

        Ok(DecryptionResult {
            clear_values,
            encoded_clear_values: decryption.encoded,
            proof: decryption.proof,
        })
    }
}
