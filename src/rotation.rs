//! Daily-quote rotation: avoid-repeats-until-exhausted selection with
//! automatic cycle reset.
//!
//! Each call picks uniformly at random among the quotes the user has not
//! seen in the current cycle. Once the whole catalog has been shown, the
//! user's seen history is cleared and a fresh cycle begins.

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::error::CoreError;
use crate::quote::Quote;
use crate::store::QuoteStore;

pub struct QuoteRotation {
    store: Arc<dyn QuoteStore>,
}

impl QuoteRotation {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self { store }
    }

    /// Select the next quote for a user, marking it as seen.
    ///
    /// Not idempotent: every successful call records the picked quote, and
    /// a call that finds the whole catalog seen clears the user's history
    /// first. Safe to retry after a partial failure; each call recomputes
    /// from the persisted state.
    pub async fn select_next(&self, user_id: Option<&str>) -> Result<Quote, CoreError> {
        let user_id = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(CoreError::NotAuthenticated),
        };

        // Always read the pool fresh; a reset must recompute against the
        // catalog as it is now, not a cached copy.
        let pool = self.store.list_quotes().await?;
        if pool.is_empty() {
            return Err(CoreError::NoQuotesAvailable);
        }

        let seen: HashSet<_> = self.store.list_seen(user_id).await?.into_iter().collect();
        let mut unseen: Vec<&Quote> = pool.iter().filter(|q| !seen.contains(&q.id)).collect();

        if unseen.is_empty() {
            // Every quote has been shown at least once; start a new cycle.
            tracing::debug!(user_id, pool_size = pool.len(), "quote cycle exhausted, resetting");
            self.store.clear_seen(user_id).await?;
            unseen = pool.iter().collect();
        }

        let picked = match unseen.choose(&mut rand::thread_rng()) {
            Some(quote) => (*quote).clone(),
            // Unreachable: unseen is never empty here since pool is non-empty.
            None => return Err(CoreError::NoQuotesAvailable),
        };

        self.store.record_seen(user_id, &picked.id).await?;
        Ok(picked)
    }
}
