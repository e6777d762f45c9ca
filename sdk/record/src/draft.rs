//! Record Draft
//!
//! Validated user input for a new record. Validation happens here, before any
//! network or crypto call is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_PUBLIC_SCORE: u8 = 1;
pub const MAX_PUBLIC_SCORE: u8 = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("usage amount is required")]
    MissingUsage,

    #[error("usage amount {0:?} is not a non-negative integer")]
    InvalidUsage(String),

    #[error("public score is required")]
    MissingScore,

    #[error("public score {0:?} is not an integer between 1 and 10")]
    InvalidScore(String),
}

/// Input for the submission flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub name: String,
    pub usage_amount: u64,
    pub public_score: u8,
}

impl RecordDraft {
    pub fn new(
        name: impl Into<String>,
        usage_amount: u64,
        public_score: u8,
    ) -> Result<Self, ValidationError> {
        let draft = Self {
            name: name.into(),
            usage_amount,
            public_score,
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Parse raw form fields.
    ///
    /// Non-digit characters are stripped from the usage field the way the form
    /// input does, so "1,200 kWh" reads as 1200.
    pub fn parse(name: &str, usage: &str, score: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let digits: String = usage.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(if usage.trim().is_empty() {
                ValidationError::MissingUsage
            } else {
                ValidationError::InvalidUsage(usage.to_string())
            });
        }
        let usage_amount = digits
            .parse::<u64>()
            .map_err(|_| ValidationError::InvalidUsage(usage.to_string()))?;

        let score = score.trim();
        if score.is_empty() {
            return Err(ValidationError::MissingScore);
        }
        let public_score = score
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidScore(score.to_string()))?;

        Self::new(name, usage_amount, public_score)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !(MIN_PUBLIC_SCORE..=MAX_PUBLIC_SCORE).contains(&self.public_score) {
            return Err(ValidationError::InvalidScore(self.public_score.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_draft() {
        let draft = RecordDraft::new("Plant A", 500, 7).unwrap();
        assert_eq!(draft.name, "Plant A");
        assert_eq!(draft.usage_amount, 500);
        assert_eq!(draft.public_score, 7);
    }

    #[test]
    fn test_score_bounds() {
        assert!(RecordDraft::new("x", 0, 1).is_ok());
        assert!(RecordDraft::new("x", 0, 10).is_ok());
        assert_eq!(
            RecordDraft::new("x", 0, 0),
            Err(ValidationError::InvalidScore("0".to_string()))
        );
        assert_eq!(
            RecordDraft::new("x", 0, 11),
            Err(ValidationError::InvalidScore("11".to_string()))
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(RecordDraft::new("   ", 5, 5), Err(ValidationError::EmptyName));
        assert_eq!(
            RecordDraft::parse("", "5", "5"),
            Err(ValidationError::EmptyName)
        );
    }

    #[test]
    fn test_parse_form_fields() {
        let draft = RecordDraft::parse("  Plant A ", "1,200 kWh", " 7 ").unwrap();
        assert_eq!(draft.name, "Plant A");
        assert_eq!(draft.usage_amount, 1200);
        assert_eq!(draft.public_score, 7);
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(
            RecordDraft::parse("Plant", "", "7"),
            Err(ValidationError::MissingUsage)
        );
        assert_eq!(
            RecordDraft::parse("Plant", "lots", "7"),
            Err(ValidationError::InvalidUsage("lots".to_string()))
        );
        assert_eq!(
            RecordDraft::parse("Plant", "5", ""),
            Err(ValidationError::MissingScore)
        );
        assert_eq!(
            RecordDraft::parse("Plant", "5", "7.5"),
            Err(ValidationError::InvalidScore("7.5".to_string()))
        );
    }
}
