//! SLA evaluation: elapsed minutes and compliant / at_risk / breached.
//!
//! Everything here is pure. Elapsed time is rounded to whole minutes (not
//! truncated) so a ticket sitting a few seconds either side of a threshold
//! does not flap between sweeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sla::policy::{target_minutes, AT_RISK_PERCENT};
use crate::ticket::{Priority, SlaStatus, Ticket};

/// Result of evaluating one ticket at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaEvaluation {
    pub elapsed_minutes: i64,
    pub target_minutes: u32,
    pub sla_status: SlaStatus,
}

impl SlaEvaluation {
    /// Elapsed time as a percentage of the target.
    pub fn percentage(&self) -> f64 {
        if self.target_minutes == 0 {
            return 100.0;
        }
        self.elapsed_minutes as f64 / self.target_minutes as f64 * 100.0
    }
}

/// Whole minutes from `created_at` to `now`, rounded half up.
///
/// A `now` before `created_at` (clock skew between writers) counts as zero.
pub fn elapsed_minutes(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - created_at).num_milliseconds().max(0);
    (millis as f64 / 60_000.0).round() as i64
}

/// Three-way live status for an elapsed time against a target.
pub fn status_for(elapsed_minutes: i64, target_minutes: u32) -> SlaStatus {
    let elapsed = elapsed_minutes.max(0) as u64;
    let target = target_minutes as u64;
    if elapsed >= target {
        SlaStatus::Breached
    } else if elapsed * 100 >= target * AT_RISK_PERCENT as u64 {
        SlaStatus::AtRisk
    } else {
        SlaStatus::Compliant
    }
}

/// Evaluate a ticket created at `created_at` with `priority` at `now`.
pub fn evaluate(created_at: DateTime<Utc>, priority: Priority, now: DateTime<Utc>) -> SlaEvaluation {
    evaluate_against_target(created_at, target_minutes(priority), now)
}

/// Evaluate against an explicit target, e.g. the one stored on the ticket.
pub fn evaluate_against_target(
    created_at: DateTime<Utc>,
    target_minutes: u32,
    now: DateTime<Utc>,
) -> SlaEvaluation {
    let elapsed = elapsed_minutes(created_at, now);
    SlaEvaluation {
        elapsed_minutes: elapsed,
        target_minutes,
        sla_status: status_for(elapsed, target_minutes),
    }
}

/// Live SLA state of a stored ticket.
///
/// Uses the target recorded at creation, not the current priority: an
/// escalated ticket keeps the clock it was opened with. Returns `None` for
/// documents without an `sla` sub-record.
pub fn evaluate_sla(ticket: &Ticket, now: DateTime<Utc>) -> Option<SlaEvaluation> {
    let sla = ticket.sla.as_ref()?;
    Some(evaluate_against_target(
        ticket.created_at,
        sla.target_resolution_time,
        now,
    ))
}

/// Terminal two-way verdict at resolution time. There is no at_risk here.
pub fn final_verdict(resolution_minutes: i64, target_minutes: u32) -> SlaStatus {
    if resolution_minutes <= target_minutes as i64 {
        SlaStatus::Compliant
    } else {
        SlaStatus::Breached
    }
}
