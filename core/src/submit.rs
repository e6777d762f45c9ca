//! Submission Orchestrator
//!
//! Drives "create record" end to end.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Submission Flow                                │
//! │                                                                      │
//! │  Idle ──▶ Encrypting ──▶ Submitting ──▶ AwaitingConfirmation         │
//! │   │           │              │                  │                    │
//! │   │           ▼              ▼                  ▼                    │
//! │   └──────────────────────▶ Failed          Refreshing ──▶ Created    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Input is validated and the identity checked before any crypto or ledger
//! call. Nothing is retried: a failed submission is re-triggered by the user.

use std::sync::Arc;
use std::time::Duration;

use gridseal_record::{Identity, RecordDraft, RecordId, RecordIdGenerator};
use tracing::{debug, info, warn};

use crate::error::{LoadError, SubmitError};
use crate::gateway::{CryptoGateway, EncryptedInput};
use crate::identity::{IdentityProvider, SessionGuard};
use crate::ledger::{CreateRecordCall, LedgerClient, PendingTx, TxReceipt};
use crate::machine::Transition;
use crate::status::{StatusReporter, StatusUpdate};
use crate::store::RecordStore;

pub const AUX_FLAG: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    Idle,
    Encrypting,
    Submitting,
    AwaitingConfirmation,
    Refreshing,
    Created,
    Failed,
}

impl SubmitPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmitPhase::Created | SubmitPhase::Failed)
    }
}

#[derive(Debug)]
pub enum SubmitEvent {
    Start,
    Encrypted(EncryptedInput),
    Sent(PendingTx),
    Confirmed(TxReceipt),
    Refreshed,
    RefreshFailed(LoadError),
    Failed(SubmitError),
}

#[derive(Debug)]
pub enum SubmitEffect {
    Encrypt,
    SendTransaction(EncryptedInput),
    AwaitConfirmation(PendingTx),
    RefreshStore,
    Done,
    Fail(SubmitError),
    /// Event did not apply to the current phase
    Ignore,
}

pub type SubmitTransition = Transition<SubmitPhase, SubmitEffect>;

/// Pure transition function of the submission machine.
pub fn step(phase: SubmitPhase, event: SubmitEvent) -> SubmitTransition {
    use SubmitEffect as Fx;
    use SubmitEvent as Ev;
    use SubmitPhase as Ph;

    match (phase, event) {
        (Ph::Idle, Ev::Start) => Transition::to(Ph::Encrypting, Fx::Encrypt)
            .with_status(StatusUpdate::pending("Creating audit with FHE encryption...")),

        (Ph::Encrypting, Ev::Encrypted(input)) => {
            Transition::to(Ph::Submitting, Fx::SendTransaction(input))
        }

        (Ph::Submitting, Ev::Sent(pending)) => {
            Transition::to(Ph::AwaitingConfirmation, Fx::AwaitConfirmation(pending))
                .with_status(StatusUpdate::pending("Waiting for transaction confirmation..."))
        }

        (Ph::AwaitingConfirmation, Ev::Confirmed(_)) => {
            Transition::to(Ph::Refreshing, Fx::RefreshStore)
        }

        (Ph::Refreshing, Ev::Refreshed) => Transition::to(Ph::Created, Fx::Done)
            .with_status(StatusUpdate::success("Audit created successfully!")),

        // The write is durable; only the local view is behind.
        (Ph::Refreshing, Ev::RefreshFailed(err)) => Transition::to(Ph::Created, Fx::Done)
            .with_status(StatusUpdate::error(format!(
                "Audit created, but refreshing records failed: {err}"
            ))),

        (phase, Ev::Failed(err)) if !phase.is_terminal() => {
            let status = StatusUpdate::error(failure_message(&err));
            Transition::to(Ph::Failed, Fx::Fail(err)).with_status(status)
        }

        (phase, _) => Transition::to(phase, Fx::Ignore),
    }
}

fn failure_message(err: &SubmitError) -> String {
    match err {
        SubmitError::NotConnected => "Please connect wallet first".to_string(),
        SubmitError::Rejected => "Transaction rejected by user".to_string(),
        SubmitError::Validation(e) => format!("Invalid audit data: {e}"),
        SubmitError::Disconnected => "Wallet disconnected, audit not created".to_string(),
        other => format!("Failed to create audit: {other}"),
    }
}

#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub confirmation_timeout: Duration,
    pub label: String,
}

pub struct SubmissionOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    gateway: Arc<dyn CryptoGateway>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<RecordStore>,
    status: Arc<StatusReporter>,
    ids: RecordIdGenerator,
    settings: SubmitSettings,
}

impl SubmissionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn CryptoGateway>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<RecordStore>,
        status: Arc<StatusReporter>,
        settings: SubmitSettings,
    ) -> Self {
        Self {
            ledger,
            gateway,
            identity,
            store,
            status,
            ids: RecordIdGenerator::new(),
            settings,
        }
    }

    /// Create a record owned by `actor`.
    ///
    /// On success the store has been refreshed past the confirmed write.
    pub async fn submit(
        &self,
        draft: &RecordDraft,
        actor: &Identity,
    ) -> Result<RecordId, SubmitError> {
        let precondition = if self.identity.current().as_ref() != Some(actor) {
            Err(SubmitError::NotConnected)
        } else {
            draft.validate().map_err(SubmitError::from)
        };
        if let Err(err) = precondition {
            return self.finish_early(err);
        }

        let id = self.ids.next_id();
        let mut guard = SessionGuard::new(self.identity.as_ref(), actor);
        info!(record = %id, actor = %actor, "submitting record");

        let mut phase = SubmitPhase::Idle;
        let mut event = SubmitEvent::Start;
        loop {
            let transition = step(phase, event);
            debug!(record = %id, from = ?phase, to = ?transition.phase, "submission step");
            phase = transition.phase;
            if let Some(update) = transition.status {
                self.status.apply(update);
            }

            event = match transition.effect {
                SubmitEffect::Encrypt => {
                    let encrypt = self.gateway.encrypt(
                        self.ledger.contract_address(),
                        actor,
                        draft.usage_amount,
                    );
                    match guard.run(encrypt).await {
                        Some(Ok(input)) => SubmitEvent::Encrypted(input),
                        Some(Err(e)) => SubmitEvent::Failed(e.into()),
                        None => SubmitEvent::Failed(SubmitError::Disconnected),
                    }
                }
                SubmitEffect::SendTransaction(input) => {
                    let call = CreateRecordCall {
                        id: id.clone(),
                        name: draft.name.clone(),
                        cipher_blob: input.cipher_blob,
                        input_proof: input.proof,
                        public_score: draft.public_score,
                        aux_flag: AUX_FLAG,
                        label: self.settings.label.clone(),
                    };
                    match guard.run(self.ledger.create_record(actor, call)).await {
                        Some(Ok(pending)) => {
                            info!(record = %id, tx = pending.tx_hash(), "create transaction sent");
                            SubmitEvent::Sent(pending)
                        }
                        Some(Err(e)) => SubmitEvent::Failed(e.into()),
                        None => SubmitEvent::Failed(SubmitError::Disconnected),
                    }
                }
                SubmitEffect::AwaitConfirmation(pending) => {
                    let confirm = pending.confirm(self.settings.confirmation_timeout);
                    match guard.run(confirm).await {
                        Some(Ok(receipt)) => SubmitEvent::Confirmed(receipt),
                        Some(Err(e)) => SubmitEvent::Failed(e.into()),
                        None => SubmitEvent::Failed(SubmitError::Disconnected),
                    }
                }
                SubmitEffect::RefreshStore => match self.store.refresh().await {
                    Ok(_) => SubmitEvent::Refreshed,
                    Err(e) => {
                        warn!(record = %id, error = %e, "refresh after create failed");
                        SubmitEvent::RefreshFailed(e)
                    }
                },
                SubmitEffect::Done => {
                    info!(record = %id, "record created");
                    return Ok(id);
                }
                SubmitEffect::Fail(err) => {
                    warn!(record = %id, error = %err, "submission failed");
                    return Err(err);
                }
                SubmitEffect::Ignore => {
                    return Err(SubmitError::Chain(format!(
                        "submission stalled in {phase:?}"
                    )));
                }
            };
        }
    }

    fn finish_early(&self, err: SubmitError) -> Result<RecordId, SubmitError> {
        let transition = step(SubmitPhase::Idle, SubmitEvent::Failed(err));
        if let Some(update) = transition.status {
            self.status.apply(update);
        }
        match transition.effect {
            SubmitEffect::Fail(err) => Err(err),
            _ => Err(SubmitError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;

    fn receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: "0xabc".to_string(),
            block_number: 1,
        }
    }

    #[test]
    fn test_happy_path_phases() {
        let t = step(SubmitPhase::Idle, SubmitEvent::Start);
        assert_eq!(t.phase, SubmitPhase::Encrypting);
        assert!(matches!(t.effect, SubmitEffect::Encrypt));
        assert_eq!(
            t.status,
            Some(StatusUpdate::pending("Creating audit with FHE encryption..."))
        );

        let input = EncryptedInput {
            handle: gridseal_record::CiphertextHandle([1u8; 32]),
            cipher_blob: vec![1, 2, 3],
            proof: vec![4, 5],
        };
        let t = step(SubmitPhase::Encrypting, SubmitEvent::Encrypted(input));
        assert_eq!(t.phase, SubmitPhase::Submitting);
        assert!(matches!(t.effect, SubmitEffect::SendTransaction(ref i) if i.cipher_blob == vec![1, 2, 3]));

        let pending = PendingTx::new("0xabc", async { Ok(receipt()) });
        let t = step(SubmitPhase::Submitting, SubmitEvent::Sent(pending));
        assert_eq!(t.phase, SubmitPhase::AwaitingConfirmation);
        assert_eq!(
            t.status,
            Some(StatusUpdate::pending("Waiting for transaction confirmation..."))
        );

        let t = step(
            SubmitPhase::AwaitingConfirmation,
            SubmitEvent::Confirmed(receipt()),
        );
        assert_eq!(t.phase, SubmitPhase::Refreshing);
        assert!(matches!(t.effect, SubmitEffect::RefreshStore));

        let t = step(SubmitPhase::Refreshing, SubmitEvent::Refreshed);
        assert_eq!(t.phase, SubmitPhase::Created);
        assert!(matches!(t.effect, SubmitEffect::Done));
        assert_eq!(t.status.map(|s| s.kind), Some(StatusKind::Success));
    }

    #[test]
    fn test_rejection_message() {
        let t = step(
            SubmitPhase::Submitting,
            SubmitEvent::Failed(SubmitError::Rejected),
        );
        assert_eq!(t.phase, SubmitPhase::Failed);
        assert!(matches!(t.effect, SubmitEffect::Fail(SubmitError::Rejected)));
        assert_eq!(
            t.status,
            Some(StatusUpdate::error("Transaction rejected by user"))
        );
    }

    #[test]
    fn test_refresh_failure_still_creates() {
        let err = LoadError::List(crate::ledger::LedgerError::Transport("down".to_string()));
        let t = step(SubmitPhase::Refreshing, SubmitEvent::RefreshFailed(err));
        assert_eq!(t.phase, SubmitPhase::Created);
        assert!(matches!(t.effect, SubmitEffect::Done));
        assert_eq!(t.status.map(|s| s.kind), Some(StatusKind::Error));
    }

    #[test]
    fn test_out_of_order_event_is_ignored() {
        let t = step(SubmitPhase::Idle, SubmitEvent::Refreshed);
        assert_eq!(t.phase, SubmitPhase::Idle);
        assert!(matches!(t.effect, SubmitEffect::Ignore));
        assert!(t.status.is_none());

        let t = step(
            SubmitPhase::Created,
            SubmitEvent::Failed(SubmitError::Disconnected),
        );
        assert_eq!(t.phase, SubmitPhase::Created);
        assert!(matches!(t.effect, SubmitEffect::Ignore));
    }
}
