//! Quote catalog and seen-history access.
//!
//! This module defines the trait interface and an in-memory implementation.
//! The real implementation talks to the managed backend's relational tables;
//! the in-memory one backs unit tests and local development.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::quote::{Quote, QuoteId, SeenRecord};

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// List the full quote catalog.
    async fn list_quotes(&self) -> Result<Vec<Quote>, CoreError>;

    /// List the ids of quotes already shown to a user.
    async fn list_seen(&self, user_id: &str) -> Result<Vec<QuoteId>, CoreError>;

    /// Record that a quote was shown to a user.
    async fn record_seen(&self, user_id: &str, quote_id: &QuoteId) -> Result<(), CoreError>;

    /// Delete all of a user's seen records.
    async fn clear_seen(&self, user_id: &str) -> Result<(), CoreError>;
}

/// In-memory store for tests and development without a real backend.
pub struct InMemoryQuoteStore {
    quotes: Mutex<Vec<Quote>>,
    seen: Mutex<Vec<SeenRecord>>,
    fail_next: Mutex<bool>,
}

impl InMemoryQuoteStore {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self {
            quotes: Mutex::new(quotes),
            seen: Mutex::new(Vec::new()),
            fail_next: Mutex::new(false),
        }
    }

    /// Add a quote to the catalog after construction.
    pub async fn add_quote(&self, quote: Quote) {
        self.quotes.lock().await.push(quote);
    }

    /// Make the next store call fail with `DataAccess`.
    pub async fn fail_next_call(&self) {
        *self.fail_next.lock().await = true;
    }

    async fn check_fault(&self) -> Result<(), CoreError> {
        let mut fail = self.fail_next.lock().await;
        if *fail {
            *fail = false;
            return Err(CoreError::DataAccess("injected store failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn list_quotes(&self) -> Result<Vec<Quote>, CoreError> {
        self.check_fault().await?;
        Ok(self.quotes.lock().await.clone())
    }

    async fn list_seen(&self, user_id: &str) -> Result<Vec<QuoteId>, CoreError> {
        self.check_fault().await?;
        let seen = self.seen.lock().await;
        Ok(seen
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.quote_id.clone())
            .collect())
    }

    async fn record_seen(&self, user_id: &str, quote_id: &QuoteId) -> Result<(), CoreError> {
        self.check_fault().await?;
        let mut seen = self.seen.lock().await;
        seen.push(SeenRecord::new(user_id, quote_id.clone()));
        Ok(())
    }

    async fn clear_seen(&self, user_id: &str) -> Result<(), CoreError> {
        self.check_fault().await?;
        let mut seen = self.seen.lock().await;
        seen.retain(|r| r.user_id != user_id);
        Ok(())
    }
}
