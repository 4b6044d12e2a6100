use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier for a quote in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A quote from the external catalog. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub category: String,
}

/// Marks that a user has already been shown a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub user_id: String,
    pub quote_id: QuoteId,
    pub seen_at: DateTime<Utc>,
}

impl SeenRecord {
    pub fn new(user_id: impl Into<String>, quote_id: QuoteId) -> Self {
        Self {
            user_id: user_id.into(),
            quote_id,
            seen_at: Utc::now(),
        }
    }
}
