use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use gridseal_record::RecordId;
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActivityKind {
    Created,
    Decrypted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub at: DateTime<Utc>,
    pub kind: ActivityKind,
    pub record: RecordId,
    pub detail: String,
}

impl Activity {
    pub fn message(&self) -> String {
        match self.kind {
            ActivityKind::Created => format!("Created audit: {}", self.detail),
            ActivityKind::Decrypted => format!("Decrypted audit: {}", self.record),
        }
    }
}

/// Bounded, newest-first log of successful user actions
pub struct ActivityLog {
    entries: Mutex<VecDeque<Activity>>,
    limit: usize,
}

impl ActivityLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    pub async fn record(&self, kind: ActivityKind, record: RecordId, detail: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        entries.push_front(Activity {
            at: Utc::now(),
            kind,
            record,
            detail: detail.into(),
        });
        entries.truncate(self.limit);
    }

    /// Up to `n` most recent entries, newest first.
    pub async fn recent(&self, n: usize) -> Vec<Activity> {
        self.entries.lock().await.iter().take(n).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_newest_first_and_bounded() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.record(
                ActivityKind::Created,
                RecordId(format!("audit-{i}")),
                format!("Plant {i}"),
            )
            .await;
        }

        assert_eq!(log.len().await, 3);
        let recent = log.recent(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message(), "Created audit: Plant 4");
        assert_eq!(recent[1].message(), "Created audit: Plant 3");
    }

    #[tokio::test]
    async fn test_decrypted_message_names_record() {
        let log = ActivityLog::new(10);
        log.record(ActivityKind::Decrypted, RecordId::from("audit-42"), "500")
            .await;
        assert_eq!(log.recent(5).await[0].message(), "Decrypted audit: audit-42");
    }
}
