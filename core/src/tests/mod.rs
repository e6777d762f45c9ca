//! Orchestration scenarios against the local devnet.

mod client;
mod submit;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gridseal_config::GridsealConfig;
use gridseal_record::{CiphertextHandle, Identity, RecordId, RecordPublicFields};
use tokio::sync::{Mutex, Notify, oneshot};

use crate::client::AuditClient;
use crate::identity::WalletSession;
use crate::ledger::{CreateRecordCall, LedgerClient, LedgerError, PendingTx};
use crate::local::{LocalChain, LocalGateway, LocalLedger};

pub(crate) fn alice() -> Identity {
    Identity("0x00000000000000000000000000000000000a11ce".to_string())
}

pub(crate) fn test_config() -> GridsealConfig {
    let mut config = GridsealConfig::default();
    config.ledger.block_time_ms = 5;
    config
}

pub(crate) struct Devnet {
    pub chain: Arc<LocalChain>,
    pub session: Arc<WalletSession>,
    pub client: AuditClient,
}

pub(crate) fn devnet() -> Devnet {
    devnet_with(test_config())
}

pub(crate) fn devnet_with(config: GridsealConfig) -> Devnet {
    let session = Arc::new(WalletSession::connected(alice()));
    let (client, chain) = AuditClient::local(&config, session.clone());
    Devnet {
        chain,
        session,
        client,
    }
}

/// Devnet whose ledger is wrapped in a [`ScriptedLedger`].
pub(crate) struct ScriptedDevnet {
    pub chain: Arc<LocalChain>,
    pub ledger: Arc<ScriptedLedger>,
    pub session: Arc<WalletSession>,
    pub client: AuditClient,
}

pub(crate) fn scripted_devnet() -> ScriptedDevnet {
    let config = test_config();
    let chain = Arc::new(LocalChain::from_config(&config.ledger));
    let ledger = Arc::new(ScriptedLedger::new(LocalLedger::new(chain.clone())));
    let gateway = Arc::new(LocalGateway::new(chain.clone()));
    let session = Arc::new(WalletSession::connected(alice()));
    let client = AuditClient::new(ledger.clone(), gateway, session.clone(), &config);
    ScriptedDevnet {
        chain,
        ledger,
        session,
        client,
    }
}

/// Ledger wrapper that can hold a listing open or serve outdated reads.
pub(crate) struct ScriptedLedger {
    inner: LocalLedger,
    list_gate: Mutex<Option<oneshot::Receiver<()>>>,
    listed: Notify,
    stale_reads: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new(inner: LocalLedger) -> Self {
        Self {
            inner,
            list_gate: Mutex::new(None),
            listed: Notify::new(),
            stale_reads: AtomicUsize::new(0),
        }
    }

    /// The next listing captures ids, then waits for the returned sender.
    pub async fn hold_next_listing(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.list_gate.lock().await = Some(gate);
        release
    }

    /// Resolves once a held listing has captured its ids.
    pub async fn wait_listed(&self) {
        self.listed.notified().await;
    }

    /// The next `n` record reads report the record as unverified.
    pub fn serve_stale_reads(&self, n: usize) {
        self.stale_reads.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    fn contract_address(&self) -> &str {
        self.inner.contract_address()
    }

    async fn list_record_ids(&self) -> Result<Vec<RecordId>, LedgerError> {
        let ids = self.inner.list_record_ids().await?;
        let gate = self.list_gate.lock().await.take();
        if let Some(gate) = gate {
            self.listed.notify_one();
            let _ = gate.await;
        }
        Ok(ids)
    }

    async fn get_record(&self, id: &RecordId) -> Result<RecordPublicFields, LedgerError> {
        let mut fields = self.inner.get_record(id).await?;
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            fields.verified = false;
            fields.decrypted_value = 0;
        }
        Ok(fields)
    }

    async fn get_ciphertext_handle(&self, id: &RecordId) -> Result<CiphertextHandle, LedgerError> {
        self.inner.get_ciphertext_handle(id).await
    }

    async fn is_service_available(&self) -> Result<bool, LedgerError> {
        self.inner.is_service_available().await
    }

    async fn create_record(
        &self,
        signer: &Identity,
        call: CreateRecordCall,
    ) -> Result<PendingTx, LedgerError> {
        self.inner.create_record(signer, call).await
    }

    async fn submit_verification(
        &self,
        signer: &Identity,
        id: &RecordId,
        encoded_clear_values: Vec<u8>,
        proof: Vec<u8>,
    ) -> Result<PendingTx, LedgerError> {
        self.inner
            .submit_verification(signer, id, encoded_clear_values, proof)
            .await
    }
}
