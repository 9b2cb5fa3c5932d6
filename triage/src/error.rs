//! Error taxonomy for ticket triage operations.
//!
//! `TriageError` is what callers of the lifecycle, escalation and policy
//! layers see. Classification failures never show up here: the remote
//! classifier's `ClassifyError` is always absorbed by the rule fallback.

use thiserror::Error;

use crate::state::StoreError;
use crate::ticket::TicketStatus;

/// Result type alias for triage operations
pub type TriageResult<T> = Result<T, TriageError>;

#[derive(Debug, Error)]
pub enum TriageError {
    /// Missing or empty input; surfaced to the caller, never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced ticket id does not exist.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    /// The acting user's role does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A priority outside {critical, high, medium, low} reached the policy table.
    #[error("Invalid priority: {0:?}")]
    InvalidPriority(String),

    /// A guarded status transition was requested out of order.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    /// A stored ticket is missing data the operation depends on.
    #[error("Corrupt ticket record {ticket_id}: {reason}")]
    CorruptRecord { ticket_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TriageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidPriority { value, .. } => Self::InvalidPriority(value),
            other => Self::Store(other),
        }
    }
}

impl TriageError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Whether this maps to a 404-style response at the API layer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Store(StoreError::NotFound(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_invalid_priority_surfaces_as_invalid_priority() {
        let err = TriageError::from(StoreError::InvalidPriority {
            ticket_id: "t-1".to_string(),
            value: "urgent".to_string(),
        });
        assert!(matches!(err, TriageError::InvalidPriority(ref v) if v == "urgent"));
    }

    #[test]
    fn test_other_store_errors_are_wrapped() {
        let err = TriageError::from(StoreError::NotFound("t-1".to_string()));
        assert!(err.is_not_found());
        assert!(matches!(
            TriageError::from(StoreError::Inactive("t-1".to_string())),
            TriageError::Store(StoreError::Inactive(_))
        ));
    }
}
