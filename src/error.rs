//! Error taxonomy for the quote rotation and presence cores.
//!
//! Every failure surfaces to the immediate caller with an explicit kind;
//! retry policy belongs to the caller, never to this crate.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No authenticated user context is available for the operation.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The quote catalog is empty. Fatal; retrying will not help until
    /// the catalog is populated.
    #[error("No quotes available")]
    NoQuotesAvailable,

    /// The underlying store failed. Transient; the caller may retry the
    /// whole operation.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// The realtime transport failed to reach a synced subscription.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl CoreError {
    /// Whether retrying the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::DataAccess(_) | CoreError::Subscription(_))
    }
}
