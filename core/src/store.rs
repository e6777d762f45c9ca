//! Record Store
//!
//! Client-side cache of every known record, rebuilt wholesale from the ledger on
//! each refresh.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Refresh                                   │
//! │                                                                  │
//! │  gen = ++counter                                                 │
//! │  list_record_ids ──▶ get_record(id) for each id                  │
//! │                        │ ok   ──▶ keep                           │
//! │                        │ err  ──▶ warn + omit                    │
//! │                        ▼                                         │
//! │  install snapshot only if gen > installed gen                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `refresh` writes. Readers take an `Arc` of the installed snapshot and
//! never block the writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use gridseal_record::{Record, RecordId};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::LoadError;
use crate::ledger::LedgerClient;

/// One installed view of the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Generation of the refresh that produced this snapshot (0 = never refreshed)
    pub generation: u64,
    /// Records in ledger order
    pub records: Arc<Vec<Record>>,
    /// Ids whose read failed during this refresh
    pub omitted: Vec<RecordId>,
}

impl Snapshot {
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn is_partial(&self) -> bool {
        !self.omitted.is_empty()
    }
}

/// Dashboard figures over a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub verified: usize,
    pub average_score: f64,
    /// Records created within the recent window
    pub recent: usize,
}

pub struct RecordStore {
    ledger: Arc<dyn LedgerClient>,
    next_generation: AtomicU64,
    current: watch::Sender<Arc<Snapshot>>,
}

impl RecordStore {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        let (current, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            ledger,
            next_generation: AtomicU64::new(0),
            current,
        }
    }

    /// Rebuild the snapshot from the ledger.
    ///
    /// A refresh overtaken by one started later returns the newer snapshot and
    /// leaves it installed.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, LoadError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let ids = self.ledger.list_record_ids().await.map_err(LoadError::List)?;

        let mut records = Vec::with_capacity(ids.len());
        let mut omitted = Vec::new();
        for id in ids {
            match self.ledger.get_record(&id).await {
                Ok(fields) => records.push(Record::from_public_fields(id, fields)),
                Err(e) => {
                    log::warn!("Omitting record {} from refresh: {}", id, e);
                    omitted.push(id);
                }
            }
        }

        let fresh = Arc::new(Snapshot {
            generation,
            records: Arc::new(records),
            omitted,
        });

        let installed = self.current.send_if_modified(|current| {
            if generation > current.generation {
                *current = Arc::clone(&fresh);
                true
            } else {
                false
            }
        });

        if installed {
            log::debug!(
                "Installed snapshot gen={} ({} records, {} omitted)",
                generation,
                fresh.records.len(),
                fresh.omitted.len()
            );
            Ok(fresh)
        } else {
            log::debug!("Discarding stale refresh gen={}", generation);
            Ok(self.snapshot())
        }
    }

    /// The installed snapshot. No I/O.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.borrow())
    }

    pub fn records(&self) -> Arc<Vec<Record>> {
        Arc::clone(&self.snapshot().records)
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.snapshot().get(id).cloned()
    }

    /// Case-insensitive match on name or id. An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<Record> {
        let term = term.trim();
        self.records()
            .iter()
            .filter(|r| term.is_empty() || r.matches(term))
            .cloned()
            .collect()
    }

    /// Totals over the installed snapshot. `now` and `window_secs` are in seconds.
    pub fn summary(&self, now: u64, window_secs: u64) -> Summary {
        let records = self.records();
        let total = records.len();
        let verified = records.iter().filter(|r| r.verified).count();
        let average_score = if total == 0 {
            0.0
        } else {
            records.iter().map(|r| f64::from(r.public_score)).sum::<f64>() / total as f64
        };
        let cutoff = now.saturating_sub(window_secs);
        let recent = records.iter().filter(|r| r.created_at >= cutoff).count();

        Summary {
            total,
            verified,
            average_score,
            recent,
        }
    }

    /// Notified on every installed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.current.subscribe()
    }
}
