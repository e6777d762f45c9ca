use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod draft;
pub use draft::{MAX_PUBLIC_SCORE, MIN_PUBLIC_SCORE, RecordDraft, ValidationError};

/// Client-assigned record identifier (`audit-<unix millis>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Hands out strictly increasing, timestamp-derived record ids.
#[derive(Debug, Default)]
pub struct RecordIdGenerator {
    last_millis: AtomicU64,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RecordId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        // Same-millisecond requests bump past the last issued value.
        let mut prev = self.last_millis.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_millis.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return RecordId(format!("audit-{next}")),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// A connected account (wallet address).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an on-chain ciphertext.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(#[serde(with = "hex::serde")] pub [u8; 32]);

impl CiphertextHandle {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({})", self.to_hex())
    }
}

/// Record fields as the contract returns them.
///
/// `decrypted_value` is zero until the record is verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPublicFields {
    pub name: String,
    pub creator: Identity,
    pub created_at: u64,
    pub public_score: u8,
    pub aux_value: u64,
    pub label: String,
    pub usage_handle: CiphertextHandle,
    pub verified: bool,
    pub decrypted_value: u64,
}

/// One energy-audit entry as the client sees it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub creator: Identity,
    pub created_at: u64,
    pub public_score: u8,
    pub encrypted_usage_handle: CiphertextHandle,
    pub verified: bool,
    /// Present iff `verified`.
    pub verified_value: Option<u64>,
}

impl Record {
    /// Build the client view from an authoritative read.
    pub fn from_public_fields(id: RecordId, fields: RecordPublicFields) -> Self {
        let verified_value = fields.verified.then_some(fields.decrypted_value);
        Self {
            id,
            name: fields.name,
            creator: fields.creator,
            created_at: fields.created_at,
            public_score: fields.public_score,
            encrypted_usage_handle: fields.usage_handle,
            verified: fields.verified,
            verified_value,
        }
    }

    /// Case-insensitive match on name or id.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.name.to_lowercase().contains(&term) || self.id.0.to_lowercase().contains(&term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fields(verified: bool, decrypted_value: u64) -> RecordPublicFields {
        RecordPublicFields {
            name: "Plant A".to_string(),
            creator: Identity("0xb1".to_string()),
            created_at: 1_700_000_000,
            public_score: 7,
            aux_value: 0,
            label: "Energy Audit Data".to_string(),
            usage_handle: CiphertextHandle([9u8; 32]),
            verified,
            decrypted_value,
        }
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let generator = RecordIdGenerator::new();
        let ids: Vec<RecordId> = (0..200).map(|_| generator.next_id()).collect();

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let millis: Vec<u64> = ids
            .iter()
            .map(|id| id.0.strip_prefix("audit-").unwrap().parse().unwrap())
            .collect();
        assert!(millis.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_unverified_record_has_no_value() {
        // The contract reports zero for unverified records; that must not leak through.
        let record = Record::from_public_fields(RecordId::from("audit-1"), fields(false, 0));
        assert!(!record.verified);
        assert_eq!(record.verified_value, None);
    }

    #[test]
    fn test_verified_record_carries_value() {
        let record = Record::from_public_fields(RecordId::from("audit-1"), fields(true, 500));
        assert!(record.verified);
        assert_eq!(record.verified_value, Some(500));
        assert_eq!(record.encrypted_usage_handle, CiphertextHandle([9u8; 32]));
    }

    #[test]
    fn test_matches_name_or_id() {
        let record = Record::from_public_fields(RecordId::from("audit-1712"), fields(false, 0));
        assert!(record.matches("plant"));
        assert!(record.matches("AUDIT-17"));
        assert!(!record.matches("warehouse"));
    }

    #[test]
    fn test_handle_serializes_as_hex() {
        let json = serde_json::to_string(&CiphertextHandle([0xab; 32])).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
    }
}
