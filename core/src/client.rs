//! Audit Client
//!
//! Facade wiring the record store, status reporter and both orchestrators to a
//! ledger, a gateway and an identity provider. This is what a UI or the CLI
//! talks to.

use std::sync::Arc;
use std::time::Duration;

use gridseal_config::GridsealConfig;
use gridseal_record::{Record, RecordDraft, RecordId};

use crate::error::{LoadError, RevealError, SubmitError};
use crate::gateway::CryptoGateway;
use crate::history::{ActivityKind, ActivityLog};
use crate::identity::IdentityProvider;
use crate::ledger::LedgerClient;
use crate::local::{LocalChain, LocalGateway, LocalLedger};
use crate::reveal::DecryptionOrchestrator;
use crate::status::StatusReporter;
use crate::store::{RecordStore, Snapshot, Summary};
use crate::submit::{SubmissionOrchestrator, SubmitSettings};

const MSG_CONNECT_FIRST: &str = "Please connect wallet first";

pub struct AuditClient {
    ledger: Arc<dyn LedgerClient>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<RecordStore>,
    status: Arc<StatusReporter>,
    submitter: SubmissionOrchestrator,
    revealer: DecryptionOrchestrator,
    history: ActivityLog,
    recent_window_secs: u64,
}

impl AuditClient {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn CryptoGateway>,
        identity: Arc<dyn IdentityProvider>,
        config: &GridsealConfig,
    ) -> Self {
        let store = Arc::new(RecordStore::new(Arc::clone(&ledger)));
        let status = Arc::new(StatusReporter::new(&config.status));
        let confirmation_timeout = Duration::from_secs(config.ledger.confirmation_timeout_secs);

        let submitter = SubmissionOrchestrator::new(
            Arc::clone(&ledger),
            Arc::clone(&gateway),
            Arc::clone(&identity),
            Arc::clone(&store),
            Arc::clone(&status),
            SubmitSettings {
                confirmation_timeout,
                label: config.ledger.record_label.clone(),
            },
        );
        let revealer = DecryptionOrchestrator::new(
            Arc::clone(&ledger),
            gateway,
            Arc::clone(&identity),
            Arc::clone(&store),
            Arc::clone(&status),
            confirmation_timeout,
        );

        Self {
            ledger,
            identity,
            store,
            status,
            submitter,
            revealer,
            history: ActivityLog::new(config.client.history_limit),
            recent_window_secs: config.client.recent_window_secs,
        }
    }

    /// Client over a fresh in-process devnet.
    pub fn local(
        config: &GridsealConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> (Self, Arc<LocalChain>) {
        let chain = Arc::new(LocalChain::from_config(&config.ledger));
        let ledger = Arc::new(LocalLedger::new(Arc::clone(&chain)));
        let gateway = Arc::new(LocalGateway::new(Arc::clone(&chain)));
        (Self::new(ledger, gateway, identity, config), chain)
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn status(&self) -> &Arc<StatusReporter> {
        &self.status
    }

    pub fn history(&self) -> &ActivityLog {
        &self.history
    }

    /// Create a record as the connected identity.
    pub async fn submit(&self, draft: &RecordDraft) -> Result<RecordId, SubmitError> {
        let Some(actor) = self.identity.current() else {
            self.status.error(MSG_CONNECT_FIRST);
            return Err(SubmitError::NotConnected);
        };

        let id = self.submitter.submit(draft, &actor).await?;
        self.history
            .record(ActivityKind::Created, id.clone(), draft.name.clone())
            .await;
        Ok(id)
    }

    /// Reveal a record's usage value as the connected identity.
    pub async fn reveal(&self, id: &RecordId) -> Result<u64, RevealError> {
        let Some(actor) = self.identity.current() else {
            self.status.error(MSG_CONNECT_FIRST);
            return Err(RevealError::NotConnected);
        };

        let value = self.revealer.reveal(id, &actor).await?;
        self.history
            .record(ActivityKind::Decrypted, id.clone(), value.to_string())
            .await;
        Ok(value)
    }

    /// User-triggered reload. Reports a partial load through the status slot.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, LoadError> {
        match self.store.refresh().await {
            Ok(snapshot) => {
                if snapshot.is_partial() {
                    self.status.error(format!(
                        "Some audits could not be loaded ({} skipped)",
                        snapshot.omitted.len()
                    ));
                }
                Ok(snapshot)
            }
            Err(e) => {
                self.status.error(format!("Failed to load audits: {e}"));
                Err(e)
            }
        }
    }

    pub async fn check_availability(&self) -> bool {
        match self.ledger.is_service_available().await {
            Ok(true) => {
                self.status.success("FHE system is available and ready!");
                true
            }
            Ok(false) => {
                self.status.error("Availability check failed");
                false
            }
            Err(e) => {
                log::warn!("Availability check failed: {}", e);
                self.status.error("Availability check failed");
                false
            }
        }
    }

    pub fn search(&self, term: &str) -> Vec<Record> {
        self.store.search(term)
    }

    pub fn summary(&self) -> Summary {
        self.store.summary(crate::unix_now(), self.recent_window_secs)
    }
}
