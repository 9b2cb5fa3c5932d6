//! Ticket status state machine.
//!
//! ```text
//! open ──► in_progress ──► resolved
//!   └──────────────────────────▲
//! ```
//!
//! `resolved` is terminal for guarded transitions. Manual overwrites from an
//! engineer and re-resolution bypass [`TicketStatus::advance`]; callers must not
//! assume ordering is enforced for those.

use crate::error::{TriageError, TriageResult};
use crate::ticket::types::TicketStatus;

impl TicketStatus {
    /// Statuses the SLA sweep looks at.
    pub const ACTIVE: [TicketStatus; 2] = [TicketStatus::Open, TicketStatus::InProgress];

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Resolved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Whether `next` is reachable from `self` through a guarded transition.
    ///
    /// Staying in the same non-terminal state counts as allowed so repeated
    /// assignment of an in-progress ticket is not an error.
    pub fn can_advance_to(&self, next: TicketStatus) -> bool {
        match (self, next) {
            (Self::Open, _) => true,
            (Self::InProgress, Self::InProgress | Self::Resolved) => true,
            (Self::InProgress, Self::Open) => false,
            (Self::Resolved, _) => false,
        }
    }

    /// Guarded transition.
    pub fn advance(&self, next: TicketStatus) -> TriageResult<TicketStatus> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(TriageError::InvalidTransition { from: *self, to: next })
        }
    }
}
