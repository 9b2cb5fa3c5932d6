//! Ticket store contract.
//!
//! The store is a narrow repository: whole-document `get`/`set`, a partial
//! `update_fields` patch, and equality / set-membership queries. The two
//! per-ticket side collections (resolutions, comments) are append-only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ticket::{
    Category, Comment, Priority, Rating, Resolution, SlaStatus, Ticket, TicketStatus,
};

/// Error type for ticket store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A stored document carries a priority outside the policy table.
    #[error("Ticket {ticket_id} has invalid priority {value:?}")]
    InvalidPriority { ticket_id: String, value: String },

    /// A patch marked `require_active` hit a resolved ticket.
    #[error("Ticket is no longer active: {0}")]
    Inactive(String),
}

#[cfg(feature = "persistent-store")]
impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        Self::RocksDb(e.into_string())
    }
}

/// Result type for ticket store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a ticket store
pub type SharedTicketStore = Arc<dyn TicketStore>;

/// Partial update of a stored ticket. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// `Some(None)` clears the assignee.
    pub assigned_to: Option<Option<String>>,
    pub escalated: Option<bool>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub escalation_reason: Option<String>,
    pub sla_status: Option<SlaStatus>,
    pub sla_resolution_time: Option<i64>,
    pub rating: Option<Rating>,
    /// Refuse the write with [`StoreError::Inactive`] if the stored ticket
    /// is already resolved. Checked under the store's write lock.
    pub require_active: bool,
}

impl TicketPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touched(now: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Only apply while the ticket is still open or in progress.
    pub fn only_if_active(mut self) -> Self {
        self.require_active = true;
        self
    }

    /// Precondition check against the current stored document.
    pub fn check(&self, ticket: &Ticket) -> StoreResult<()> {
        if self.require_active && !ticket.is_active() {
            return Err(StoreError::Inactive(ticket.ticket_id.clone()));
        }
        Ok(())
    }

    /// Apply to an in-memory ticket. SLA fields are ignored for documents
    /// without an `sla` sub-record.
    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(priority) = self.priority {
            ticket.priority = priority;
        }
        if let Some(updated_at) = self.updated_at {
            ticket.updated_at = updated_at;
        }
        if let Some(closed_at) = self.closed_at {
            ticket.closed_at = Some(closed_at);
        }
        if let Some(assigned_to) = &self.assigned_to {
            ticket.assigned_to = assigned_to.clone();
        }
        if let Some(escalated) = self.escalated {
            ticket.escalated = escalated;
        }
        if let Some(escalated_at) = self.escalated_at {
            ticket.escalated_at = Some(escalated_at);
        }
        if let Some(reason) = &self.escalation_reason {
            ticket.escalation_reason = Some(reason.clone());
        }
        if let Some(sla) = ticket.sla.as_mut() {
            if let Some(status) = self.sla_status {
                sla.sla_status = status;
            }
            if let Some(minutes) = self.sla_resolution_time {
                sla.resolution_time = Some(minutes);
            }
        }
        if let Some(rating) = &self.rating {
            ticket.rating = Some(rating.clone());
        }
    }
}

/// Equality / set-membership filter over tickets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketQuery {
    /// Empty means any status.
    pub status_in: Vec<TicketStatus>,
    pub user_id: Option<String>,
    pub assigned_to: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    pub limit: Option<usize>,
}

impl TicketQuery {
    pub fn all() -> Self {
        Self::default()
    }

    /// Tickets the SLA sweep looks at.
    pub fn active() -> Self {
        Self {
            status_in: TicketStatus::ACTIVE.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status_in = vec![status];
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn assigned_to(mut self, engineer_id: impl Into<String>) -> Self {
        self.assigned_to = Some(engineer_id.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        (self.status_in.is_empty() || self.status_in.contains(&ticket.status))
            && self.user_id.as_ref().map_or(true, |u| *u == ticket.user_id)
            && self
                .assigned_to
                .as_ref()
                .map_or(true, |a| ticket.assigned_to.as_ref() == Some(a))
            && self.category.map_or(true, |c| c == ticket.category)
            && self.priority.map_or(true, |p| p == ticket.priority)
    }

    /// Filter, order by `createdAt` ascending, then truncate to the limit.
    pub fn select<'a>(&self, tickets: impl IntoIterator<Item = &'a Ticket>) -> Vec<Ticket> {
        let mut selected: Vec<Ticket> = tickets
            .into_iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect();
        selected.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.ticket_id.cmp(&b.ticket_id))
        });
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Stored ticket document that matched a scan but could not be decoded.
#[derive(Debug)]
pub struct RejectedTicket {
    pub ticket_id: String,
    pub error: StoreError,
}

/// Result of [`TicketStore::scan`].
#[derive(Debug, Default)]
pub struct TicketScan {
    pub tickets: Vec<Ticket>,
    pub rejected: Vec<RejectedTicket>,
}

/// Persistence seam for tickets and their side collections.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, ticket_id: &str) -> StoreResult<Option<Ticket>>;

    /// Insert or replace the whole document.
    async fn set(&self, ticket: &Ticket) -> StoreResult<()>;

    /// Apply `patch` to an existing document and return the result.
    /// Fails with [`StoreError::NotFound`] if the ticket does not exist and
    /// with [`StoreError::Inactive`] if the patch's precondition fails.
    async fn update_fields(&self, ticket_id: &str, patch: &TicketPatch) -> StoreResult<Ticket>;

    /// Matching tickets ordered by `createdAt` ascending.
    async fn query(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>>;

    /// Like [`query`](Self::query), but also returns stored documents in
    /// range that failed to decode. Typed stores never have any.
    async fn scan(&self, query: &TicketQuery) -> StoreResult<TicketScan> {
        Ok(TicketScan {
            tickets: self.query(query).await?,
            rejected: Vec::new(),
        })
    }

    async fn add_resolution(&self, ticket_id: &str, resolution: &Resolution) -> StoreResult<()>;

    /// Resolutions for a ticket, oldest first.
    async fn resolutions(&self, ticket_id: &str) -> StoreResult<Vec<Resolution>>;

    async fn add_comment(&self, ticket_id: &str, comment: &Comment) -> StoreResult<()>;

    /// Comments for a ticket, oldest first.
    async fn comments(&self, ticket_id: &str) -> StoreResult<Vec<Comment>>;
}
