//! Escalation sweep over active tickets.
//!
//! One evaluation per active ticket per sweep. Depending on the result the
//! ticket is escalated (priority promoted to critical, one-shot latch set) or
//! only has its stored `slaStatus` refreshed. Both cases write a single
//! patch, so there is no second job racing on the same field.

pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Priority, SlaStatus, TicketId};

pub use engine::{plan, EscalationEngine, SkipReason, SweepAction};

/// Configuration for the escalation sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Cap on tickets examined per sweep. `None` scans every active ticket.
    pub batch_limit: Option<usize>,
}

/// A ticket promoted to critical by a sweep.
///
/// `sla_status` is the live status at escalation time, which is also what
/// the sweep writes to `sla.slaStatus`. It is `at_risk` for a ticket that
/// crosses 80% between sweeps, but `breached` for one first seen at or past
/// its target (for example after downtime or a long sweep interval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationEvent {
    pub ticket_id: TicketId,
    pub title: String,
    /// Whole-number percentage of the SLA target consumed.
    pub sla_percentage: u32,
    pub previous_priority: Priority,
    pub sla_status: SlaStatus,
    pub escalated_at: DateTime<Utc>,
}

/// Stored `slaStatus` changed without an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaRefresh {
    pub ticket_id: TicketId,
    pub from: SlaStatus,
    pub to: SlaStatus,
}

/// A ticket the sweep could not process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub ticket_id: TicketId,
    pub error: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub swept_at: DateTime<Utc>,
    /// Active tickets examined.
    pub scanned: usize,
    pub escalations: Vec<EscalationEvent>,
    pub refreshed: Vec<SlaRefresh>,
    /// Tickets without a usable `sla` sub-record, plus tickets resolved
    /// between the scan and the write.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn empty(swept_at: DateTime<Utc>) -> Self {
        Self {
            swept_at,
            scanned: 0,
            escalations: Vec::new(),
            refreshed: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn escalated_ids(&self) -> Vec<&str> {
        self.escalations.iter().map(|e| e.ticket_id.as_str()).collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
