//! Read-only aggregates over a ticket set for dashboards.
//!
//! These are pure functions; callers fetch the tickets (usually
//! `TicketQuery::all()`) and pass them in.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{SlaStatus, Ticket, TicketStatus};

/// Counts of stored SLA states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaStats {
    pub total: usize,
    pub compliant: usize,
    pub at_risk: usize,
    pub breached: usize,
    /// Percentage of compliant tickets, two decimals.
    pub compliance_rate: String,
}

/// Dashboard summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_tickets: usize,
    pub category_breakdown: BTreeMap<String, usize>,
    pub priority_breakdown: BTreeMap<String, usize>,
    pub status_breakdown: BTreeMap<String, usize>,
    /// Mean resolution time in whole minutes over resolved tickets.
    pub avg_resolution_time: i64,
    pub sla_compliance: String,
}

/// Tickets created on one UTC day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: usize,
    pub categories: BTreeMap<String, usize>,
}

fn compliance_rate(compliant: usize, total: usize) -> String {
    if total == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", compliant as f64 / total as f64 * 100.0)
}

fn stored_sla_status(ticket: &Ticket) -> Option<SlaStatus> {
    ticket.sla.as_ref().map(|sla| sla.sla_status)
}

pub fn sla_stats(tickets: &[Ticket]) -> SlaStats {
    let mut stats = SlaStats {
        total: tickets.len(),
        compliant: 0,
        at_risk: 0,
        breached: 0,
        compliance_rate: String::new(),
    };
    for ticket in tickets {
        match stored_sla_status(ticket) {
            Some(SlaStatus::Compliant) => stats.compliant += 1,
            Some(SlaStatus::AtRisk) => stats.at_risk += 1,
            Some(SlaStatus::Breached) => stats.breached += 1,
            None => {}
        }
    }
    stats.compliance_rate = compliance_rate(stats.compliant, stats.total);
    stats
}

pub fn analytics(tickets: &[Ticket]) -> Analytics {
    let mut category_breakdown = BTreeMap::new();
    let mut priority_breakdown = BTreeMap::new();
    let mut status_breakdown = BTreeMap::new();
    let mut total_resolution = 0i64;
    let mut resolved = 0i64;
    let mut compliant = 0usize;

    for ticket in tickets {
        *category_breakdown
            .entry(ticket.category.to_string())
            .or_insert(0) += 1;
        *priority_breakdown
            .entry(ticket.priority.to_string())
            .or_insert(0) += 1;
        *status_breakdown.entry(ticket.status.to_string()).or_insert(0) += 1;

        if let Some(sla) = &ticket.sla {
            if ticket.status == TicketStatus::Resolved {
                // zero-minute resolutions are left out of the average
                if let Some(minutes) = sla.resolution_time.filter(|m| *m > 0) {
                    total_resolution += minutes;
                    resolved += 1;
                }
            }
            if sla.sla_status == SlaStatus::Compliant {
                compliant += 1;
            }
        }
    }

    let avg_resolution_time = if resolved > 0 {
        (total_resolution as f64 / resolved as f64).round() as i64
    } else {
        0
    };

    Analytics {
        total_tickets: tickets.len(),
        category_breakdown,
        priority_breakdown,
        status_breakdown,
        avg_resolution_time,
        sla_compliance: compliance_rate(compliant, tickets.len()),
    }
}

/// Per-day creation counts for the last `days` days, oldest day first.
pub fn ticket_trends(tickets: &[Ticket], days: u32, now: DateTime<Utc>) -> Vec<TrendPoint> {
    let since = now - Duration::days(days as i64);
    let mut by_day: BTreeMap<String, TrendPoint> = BTreeMap::new();

    for ticket in tickets.iter().filter(|t| t.created_at >= since) {
        let date = ticket.created_at.format("%Y-%m-%d").to_string();
        let point = by_day.entry(date.clone()).or_insert_with(|| TrendPoint {
            date,
            count: 0,
            categories: BTreeMap::new(),
        });
        point.count += 1;
        *point
            .categories
            .entry(ticket.category.to_string())
            .or_insert(0) += 1;
    }

    by_day.into_values().collect()
}
