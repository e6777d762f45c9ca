use std::sync::Arc;

use async_trait::async_trait;
use gridseal_fhe::{SealedInput, decode_clear_values, verify_decryption_proof, verify_input_proof};
use gridseal_record::{CiphertextHandle, Identity, RecordId, RecordPublicFields};

use super::{CallCounters, LocalChain, tx_hash};
use crate::ledger::{CreateRecordCall, LedgerClient, LedgerError, PendingTx};

fn reverted(reason: &str) -> LedgerError {
    LedgerError::Reverted {
        reason: reason.to_string(),
    }
}

/// [`LedgerClient`] over a [`LocalChain`]
#[derive(Clone)]
pub struct LocalLedger {
    chain: Arc<LocalChain>,
}

impl LocalLedger {
    pub fn new(chain: Arc<LocalChain>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<LocalChain> {
        &self.chain
    }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    fn contract_address(&self) -> &str {
        self.chain.contract()
    }

    async fn list_record_ids(&self) -> Result<Vec<RecordId>, LedgerError> {
        Ok(self.chain.state.lock().await.order.clone())
    }

    async fn get_record(&self, id: &RecordId) -> Result<RecordPublicFields, LedgerError> {
        let state = self.chain.state.lock().await;
        if state.faults.unreadable.contains(id) {
            return Err(LedgerError::Transport(format!("read of {id} timed out")));
        }
        state
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| reverted("Record not found"))
    }

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, LedgerError> {
        let state = self.chain.state.lock().await;
        if state.faults.unreadable.contains(id) {
            return Err(LedgerError::Transport(format!("read of {id} timed out")));
        }
        state
            .records
            .get(id)
            .map(|r| r.usage_handle)
            .ok_or_else(|| reverted("Record not found"))
    }

    async fn is_service_available(&self) -> Result<bool, LedgerError> {
        Ok(self.chain.state.lock().await.available)
    }

    async fn create_record(
        &self,
        signer: &Identity,
        call: CreateRecordCall,
    ) -> Result<PendingTx, LedgerError> {
        CallCounters::bump(&self.chain.counters.create_record);
        let mut state = self.chain.state.lock().await;
        state.faults.take_write_fault()?;

        let handle = SealedInput::compute_handle(&call.cipher_blob);
        verify_input_proof(
            self.chain.verifier(),
            self.chain.contract(),
            signer.as_str(),
            &handle,
            &call.cipher_blob,
            &call.input_proof,
        )
        .map_err(|_| reverted("Invalid input proof"))?;

        if state.records.contains_key(&call.id) {
            return Err(reverted("Record already exists"));
        }

        state.block_number += 1;
        let block_number = state.block_number;
        state.ciphertexts.insert(handle, call.cipher_blob);
        state.order.push(call.id.clone());
        state.records.insert(
            call.id.clone(),
            RecordPublicFields {
                name: call.name,
                creator: signer.clone(),
                created_at: crate::unix_now(),
                public_score: call.public_score,
                aux_value: call.aux_flag,
                label: call.label,
                usage_handle: CiphertextHandle(handle),
                verified: false,
                decrypted_value: 0,
            },
        );
        log::debug!("createRecord {} included in block {}", call.id, block_number);

        let stalled = state.faults.stall_confirmations;
        Ok(self.chain.pending(
            tx_hash(block_number, "createRecord", &call.id),
            block_number,
            stalled,
        ))
    }

    async fn submit_verification(
        &self,
        signer: &Identity,
        id: &RecordId,
        encoded_clear_values: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<PendingTx, LedgerError> {
        CallCounters::bump(&self.chain.counters.submit_verification);
        let mut state = self.chain.state.lock().await;
        state.faults.take_write_fault()?;

        let record = state
            .records
            .get(id)
            .ok_or_else(|| reverted("Record not found"))?;
        if record.verified {
            return Err(reverted("Data already verified"));
        }

        let handle = record.usage_handle;
        verify_decryption_proof(
            self.chain.verifier(),
            self.chain.contract(),
            &[handle.0],
            &encoded_clear_values,
            &proof,
        )
        .map_err(|_| reverted("Invalid decryption proof"))?;

        let value = decode_clear_values(&encoded_clear_values)
            .ok()
            .and_then(|values| values.first().copied())
            .ok_or_else(|| reverted("Malformed clear values"))?;

        state.block_number += 1;
        let block_number = state.block_number;
        if let Some(record) = state.records.get_mut(id) {
            record.verified = true;
            record.decrypted_value = value;
        }
        log::debug!(
            "verifyDecryption {} by {} included in block {}",
            id,
            signer,
            block_number
        );

        let stalled = state.faults.stall_confirmations;
        Ok(self
            .chain
            .pending(tx_hash(block_number, "verifyDecryption", id), block_number, stalled))
    }
}
