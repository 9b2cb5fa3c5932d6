//! Fixed SLA policy table: priority → target resolution minutes.

use crate::error::TriageResult;
use crate::ticket::Priority;

/// Share of the target (in percent) at which a ticket counts as at risk.
///
/// Live evaluation and escalation both read this constant; they must agree.
pub const AT_RISK_PERCENT: u32 = 80;

/// Target resolution time in minutes for a priority.
pub const fn target_minutes(priority: Priority) -> u32 {
    match priority {
        Priority::Critical => 2 * 60,
        Priority::High => 8 * 60,
        Priority::Medium => 24 * 60,
        Priority::Low => 72 * 60,
    }
}

/// Target lookup for a raw stored priority string.
///
/// An unknown value is a data error, not a user error, so it is logged at
/// error level before being returned.
pub fn target_minutes_for(raw: &str) -> TriageResult<u32> {
    match raw.parse::<Priority>() {
        Ok(priority) => Ok(target_minutes(priority)),
        Err(e) => {
            tracing::error!(priority = %raw, "SLA policy lookup with unknown priority");
            Err(e)
        }
    }
}
