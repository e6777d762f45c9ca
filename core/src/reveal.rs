//! Decryption Orchestrator
//!
//! Drives "reveal record value" end to end.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                          Reveal Flow                                      │
//! │                                                                           │
//! │  Idle ──▶ CheckingOnChainStatus ──verified──▶ AlreadyVerified             │
//! │                    │                                                      │
//! │                    ▼                                                      │
//! │            RequestingProof ──▶ SubmittingVerification ──▶ Refreshing      │
//! │                                       │                       │           │
//! │                               "already verified"              ▼           │
//! │                                       ▼                   Verified        │
//! │                                  Reconciling ──▶ AlreadyVerified          │
//! │                                                                           │
//! │  any non-terminal phase ──error──▶ Failed                                 │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway is handed a [`ProofSubmitter`] that forwards the proof back to the
//! driver over a channel. The driver submits and confirms the verification
//! transaction itself, replies to the gateway, then collects the clear values.
//!
//! Concurrent reveals of one record share a single run: the first caller leads,
//! later callers wait for its result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use gridseal_record::{CiphertextHandle, Identity, RecordId};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::error::{LoadError, RevealError};
use crate::gateway::{CryptoGateway, DecryptionResult, GatewayError, ProofSubmitter};
use crate::identity::{IdentityProvider, SessionGuard};
use crate::ledger::{BoxFuture, LedgerClient, LedgerError, TxReceipt};
use crate::machine::Transition;
use crate::status::{StatusReporter, StatusUpdate};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Idle,
    CheckingOnChainStatus,
    RequestingProof,
    SubmittingVerification,
    Refreshing,
    Reconciling,
    Verified,
    AlreadyVerified,
    Failed,
}

impl RevealPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RevealPhase::Verified | RevealPhase::AlreadyVerified | RevealPhase::Failed
        )
    }
}

type ProofReply = oneshot::Sender<Result<TxReceipt, LedgerError>>;

/// Proof handed from the gateway to the driver for on-chain submission.
#[derive(Debug)]
pub struct ProofHandoff {
    pub encoded_clear_values: Vec<u8>,
    pub proof: Vec<u8>,
    reply: ProofReply,
}

#[derive(Debug)]
pub enum RevealEvent {
    Start,
    /// `value` is only meaningful when `verified`
    StatusRead { verified: bool, value: u64 },
    ProofReady(ProofHandoff),
    VerificationSettled {
        reply: ProofReply,
        result: Result<TxReceipt, LedgerError>,
    },
    Decrypted(u64),
    Refreshed(u64),
    RefreshFailed { value: u64, error: LoadError },
    Reconciled(u64),
    Failed(RevealError),
}

#[derive(Debug)]
pub enum RevealEffect {
    ReadStatus,
    RequestProof,
    SubmitVerification(ProofHandoff),
    CompleteDecryption { reply: ProofReply, receipt: TxReceipt },
    Reconcile { reply: ProofReply, error: LedgerError },
    RefreshStore(u64),
    Done(u64),
    Fail(RevealError),
    /// Event did not apply to the current phase
    Ignore,
}

pub type RevealTransition = Transition<RevealPhase, RevealEffect>;

const MSG_ALREADY_VERIFIED: &str = "Data already verified on-chain";

/// Pure transition function of the reveal machine.
pub fn step(phase: RevealPhase, event: RevealEvent) -> RevealTransition {
    use RevealEffect as Fx;
    use RevealEvent as Ev;
    use RevealPhase as Ph;

    match (phase, event) {
        (Ph::Idle, Ev::Start) => Transition::to(Ph::CheckingOnChainStatus, Fx::ReadStatus)
            .with_status(StatusUpdate::pending("Checking on-chain status...")),

        (Ph::CheckingOnChainStatus, Ev::StatusRead { verified: true, value }) => {
            Transition::to(Ph::AlreadyVerified, Fx::Done(value))
                .with_status(StatusUpdate::success(MSG_ALREADY_VERIFIED))
        }

        (Ph::CheckingOnChainStatus, Ev::StatusRead { verified: false, .. }) => {
            Transition::to(Ph::RequestingProof, Fx::RequestProof)
                .with_status(StatusUpdate::pending("Requesting decryption proof..."))
        }

        (Ph::RequestingProof, Ev::ProofReady(handoff)) => {
            Transition::to(Ph::SubmittingVerification, Fx::SubmitVerification(handoff))
                .with_status(StatusUpdate::pending("Verifying decryption on-chain..."))
        }

        (Ph::SubmittingVerification, Ev::VerificationSettled { reply, result }) => match result {
            Ok(receipt) => Transition::to(
                Ph::SubmittingVerification,
                Fx::CompleteDecryption { reply, receipt },
            ),
            Err(error) if error.is_already_verified() => {
                Transition::to(Ph::Reconciling, Fx::Reconcile { reply, error })
                    .with_status(StatusUpdate::pending("Record already verified, reconciling..."))
            }
            Err(error) => {
                let err = RevealError::from(error);
                let status = StatusUpdate::error(failure_message(&err));
                Transition::to(Ph::Failed, Fx::Fail(err)).with_status(status)
            }
        },

        (Ph::SubmittingVerification, Ev::Decrypted(value)) => {
            Transition::to(Ph::Refreshing, Fx::RefreshStore(value))
        }

        (Ph::Refreshing, Ev::Refreshed(value)) => Transition::to(Ph::Verified, Fx::Done(value))
            .with_status(StatusUpdate::success("Data decrypted and verified successfully!")),

        // Verification is on-chain; only the local view is behind.
        (Ph::Refreshing, Ev::RefreshFailed { value, error }) => {
            Transition::to(Ph::Verified, Fx::Done(value)).with_status(StatusUpdate::error(
                format!("Data verified, but refreshing records failed: {error}"),
            ))
        }

        (Ph::Reconciling, Ev::Reconciled(value)) => {
            Transition::to(Ph::AlreadyVerified, Fx::Done(value))
                .with_status(StatusUpdate::success(MSG_ALREADY_VERIFIED))
        }

        (phase, Ev::Failed(err)) if !phase.is_terminal() => {
            let status = StatusUpdate::error(failure_message(&err));
            Transition::to(Ph::Failed, Fx::Fail(err)).with_status(status)
        }

        (phase, _) => Transition::to(phase, Fx::Ignore),
    }
}

fn failure_message(err: &RevealError) -> String {
    match err {
        RevealError::NotConnected => "Please connect wallet first".to_string(),
        RevealError::Rejected => "Transaction rejected by user".to_string(),
        other => format!("Decryption failed: {other}"),
    }
}

fn read_failed(id: &RecordId, source: LedgerError) -> RevealEvent {
    RevealEvent::Failed(RevealError::Load(LoadError::Read {
        id: id.clone(),
        source,
    }))
}

fn finished_without_submitting(result: Result<DecryptionResult, GatewayError>) -> RevealEvent {
    match result {
        Err(e) => RevealEvent::Failed(e.into()),
        Ok(_) => RevealEvent::Failed(RevealError::Proof(
            "gateway returned without submitting the proof".to_string(),
        )),
    }
}

type Shared = watch::Receiver<Option<Result<u64, RevealError>>>;

struct Inflight {
    ticket: u64,
    result: Shared,
}

enum Role {
    Leader {
        ticket: u64,
        result: watch::Sender<Option<Result<u64, RevealError>>>,
    },
    Follower(Shared),
}

/// Removes the leader's entry when its run ends or is dropped.
struct InflightGuard<'a> {
    map: &'a DashMap<RecordId, Inflight>,
    id: &'a RecordId,
    ticket: u64,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.map
            .remove_if(self.id, |_, entry| entry.ticket == self.ticket);
    }
}

pub struct DecryptionOrchestrator {
    ledger: Arc<dyn LedgerClient>,
    gateway: Arc<dyn CryptoGateway>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<RecordStore>,
    status: Arc<StatusReporter>,
    confirmation_timeout: Duration,
    inflight: DashMap<RecordId, Inflight>,
    tickets: AtomicU64,
}

impl DecryptionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        gateway: Arc<dyn CryptoGateway>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<RecordStore>,
        status: Arc<StatusReporter>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            gateway,
            identity,
            store,
            status,
            confirmation_timeout,
            inflight: DashMap::new(),
            tickets: AtomicU64::new(0),
        }
    }

    /// Reveal the usage value of `id`, verifying it on-chain if needed.
    pub async fn reveal(&self, id: &RecordId, actor: &Identity) -> Result<u64, RevealError> {
        if self.identity.current().as_ref() != Some(actor) {
            let transition = step(
                RevealPhase::Idle,
                RevealEvent::Failed(RevealError::NotConnected),
            );
            if let Some(update) = transition.status {
                self.status.apply(update);
            }
            return Err(RevealError::NotConnected);
        }

        loop {
            let role = match self.inflight.entry(id.clone()) {
                Entry::Occupied(entry) => Role::Follower(entry.get().result.clone()),
                Entry::Vacant(entry) => {
                    let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = watch::channel(None);
                    entry.insert(Inflight { ticket, result: rx });
                    Role::Leader { ticket, result: tx }
                }
            };

            match role {
                Role::Leader { ticket, result } => {
                    let _inflight = InflightGuard {
                        map: &self.inflight,
                        id,
                        ticket,
                    };
                    let outcome = self.run(id, actor).await;
                    result.send_replace(Some(outcome.clone()));
                    return outcome;
                }
                Role::Follower(mut shared) => {
                    debug!(record = %id, "reveal already in flight, waiting for it");
                    let outcome = match shared.wait_for(Option::is_some).await {
                        Ok(done) => done.clone(),
                        Err(_) => None,
                    };
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                    // Leader dropped without a result; take over.
                }
            }
        }
    }

    async fn run(&self, id: &RecordId, actor: &Identity) -> Result<u64, RevealError> {
        let mut guard = SessionGuard::new(self.identity.as_ref(), actor);
        let mut handle: Option<CiphertextHandle> = None;
        let mut decryption: Option<BoxFuture<'static, Result<DecryptionResult, GatewayError>>> =
            None;

        info!(record = %id, actor = %actor, "revealing record");

        let mut phase = RevealPhase::Idle;
        let mut event = RevealEvent::Start;
        loop {
            let transition = step(phase, event);
            debug!(record = %id, from = ?phase, to = ?transition.phase, "reveal step");
            phase = transition.phase;
            if let Some(update) = transition.status {
                self.status.apply(update);
            }

            event = match transition.effect {
                RevealEffect::ReadStatus => match guard.run(self.ledger.get_record(id)).await {
                    Some(Ok(fields)) => RevealEvent::StatusRead {
                        verified: fields.verified,
                        value: fields.decrypted_value,
                    },
                    Some(Err(e)) => read_failed(id, e),
                    None => RevealEvent::Failed(RevealError::Disconnected),
                },

                RevealEffect::RequestProof => 'request: {
                    let ciphertext = match guard.run(self.ledger.get_ciphertext_handle(id)).await
                    {
                        Some(Ok(h)) => h,
                        Some(Err(e)) => break 'request read_failed(id, e),
                        None => break 'request RevealEvent::Failed(RevealError::Disconnected),
                    };
                    handle = Some(ciphertext);

                    let (handoff_tx, mut handoff_rx) = mpsc::channel(1);
                    let running = decryption.insert(self.start_decryption(ciphertext, handoff_tx));
                    let wait = async {
                        tokio::select! {
                            Some(handoff) = handoff_rx.recv() => RevealEvent::ProofReady(handoff),
                            result = running.as_mut() => finished_without_submitting(result),
                        }
                    };
                    guard
                        .run(wait)
                        .await
                        .unwrap_or(RevealEvent::Failed(RevealError::Disconnected))
                }

                RevealEffect::SubmitVerification(handoff) => {
                    let ProofHandoff {
                        encoded_clear_values,
                        proof,
                        reply,
                    } = handoff;
                    let submit = async {
                        match self
                            .ledger
                            .submit_verification(actor, id, encoded_clear_values, proof)
                            .await
                        {
                            Ok(pending) => {
                                info!(record = %id, tx = pending.tx_hash(), "verification sent");
                                pending.confirm(self.confirmation_timeout).await
                            }
                            Err(e) => Err(e),
                        }
                    };
                    match guard.run(submit).await {
                        Some(result) => RevealEvent::VerificationSettled { reply, result },
                        None => RevealEvent::Failed(RevealError::Disconnected),
                    }
                }

                RevealEffect::CompleteDecryption { reply, receipt } => 'complete: {
                    // The gateway may already be gone; its result is checked below.
                    let _ = reply.send(Ok(receipt));
                    let Some(running) = decryption.take() else {
                        break 'complete RevealEvent::Failed(RevealError::Proof(
                            "no decryption in progress".to_string(),
                        ));
                    };
                    match guard.run(running).await {
                        Some(Ok(result)) => {
                            match handle.and_then(|h| result.clear_values.get(&h).copied()) {
                                Some(value) => RevealEvent::Decrypted(value),
                                None => RevealEvent::Failed(RevealError::Proof(
                                    "no clear value for the record's handle".to_string(),
                                )),
                            }
                        }
                        Some(Err(e)) => RevealEvent::Failed(e.into()),
                        None => RevealEvent::Failed(RevealError::Disconnected),
                    }
                }

                RevealEffect::Reconcile { reply, error } => {
                    let _ = reply.send(Err(error));
                    decryption = None;
                    info!(record = %id, "record verified concurrently, reconciling");

                    // Unguarded: the record is already verified on-chain.
                    if let Err(e) = self.store.refresh().await {
                        warn!(record = %id, error = %e, "refresh during reconcile failed");
                    }
                    match guard.run(self.ledger.get_record(id)).await {
                        Some(Ok(fields)) if fields.verified => {
                            RevealEvent::Reconciled(fields.decrypted_value)
                        }
                        Some(Ok(_)) => RevealEvent::Failed(RevealError::Chain(
                            "verification refused as duplicate but record is unverified"
                                .to_string(),
                        )),
                        Some(Err(e)) => read_failed(id, e),
                        None => RevealEvent::Failed(RevealError::Disconnected),
                    }
                }

                // Unguarded: the verification is confirmed, so a disconnect
                // must not turn it into a failure.
                RevealEffect::RefreshStore(value) => match self.store.refresh().await {
                    Ok(_) => RevealEvent::Refreshed(value),
                    Err(error) => {
                        warn!(record = %id, error = %error, "refresh after verification failed");
                        RevealEvent::RefreshFailed { value, error }
                    }
                },

                RevealEffect::Done(value) => {
                    info!(record = %id, ?phase, "reveal complete");
                    return Ok(value);
                }

                RevealEffect::Fail(err) => {
                    warn!(record = %id, error = %err, "reveal failed");
                    return Err(err);
                }

                RevealEffect::Ignore => {
                    return Err(RevealError::Proof(format!("reveal stalled in {phase:?}")));
                }
            };
        }
    }

    /// Start the gateway's decryption with a submitter that hands the proof back here.
    fn start_decryption(
        &self,
        handle: CiphertextHandle,
        handoff: mpsc::Sender<ProofHandoff>,
    ) -> BoxFuture<'static, Result<DecryptionResult, GatewayError>> {
        let gateway = Arc::clone(&self.gateway);
        let target = self.ledger.contract_address().to_string();

        let submit: ProofSubmitter = Box::new(
            move |encoded_clear_values: Vec<u8>,
                  proof: Vec<u8>|
                  -> BoxFuture<'static, Result<TxReceipt, LedgerError>> {
                Box::pin(async move {
                    let (reply, settled) = oneshot::channel();
                    let handed = ProofHandoff {
                        encoded_clear_values,
                        proof,
                        reply,
                    };
                    if handoff.send(handed).await.is_err() {
                        return Err(LedgerError::Transport(
                            "reveal abandoned before submission".to_string(),
                        ));
                    }
                    settled.await.unwrap_or_else(|_| {
                        Err(LedgerError::Transport(
                            "reveal abandoned during submission".to_string(),
                        ))
                    })
                })
            },
        );

        Box::pin(async move {
            gateway
                .request_decryption_proof(&[handle], &target, submit)
                .await
        })
    }
}
