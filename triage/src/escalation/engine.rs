//! Escalation engine: pure per-ticket planning plus the sweep loop.
//!
//! [`plan`] is pure: it looks at one ticket and one instant and says what the
//! sweep should write. [`EscalationEngine::sweep`] applies those plans
//! through the store and never fails as a whole.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::escalation::{
    EscalationConfig, EscalationEvent, SlaRefresh, SweepFailure, SweepReport,
};
use crate::sla::{evaluate_sla, SlaEvaluation};
use crate::state::{SharedTicketStore, StoreError, TicketPatch, TicketQuery};
use crate::ticket::{Priority, SlaStatus, Ticket};

/// Why a ticket was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Resolved tickets are outside the sweep.
    Inactive,
    /// Legacy document without an `sla` sub-record.
    MissingSla,
    /// Stored target of zero minutes.
    ZeroTarget,
}

/// What the sweep should do with one ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepAction {
    /// Promote to critical and latch `escalated`.
    Escalate {
        evaluation: SlaEvaluation,
        reason: String,
    },
    /// Only the stored `slaStatus` is stale.
    Refresh {
        from: SlaStatus,
        to: SlaStatus,
    },
    Unchanged,
    Skip(SkipReason),
}

/// Decide the sweep action for `ticket` at `now`.
///
/// Escalation requires the ticket to be at or past the at-risk threshold,
/// not already critical and not already escalated. The status written is
/// the evaluated one, so a ticket first seen past its target is escalated
/// as breached rather than at_risk.
pub fn plan(ticket: &Ticket, now: DateTime<Utc>) -> SweepAction {
    if !ticket.is_active() {
        return SweepAction::Skip(SkipReason::Inactive);
    }
    let Some(sla) = ticket.sla.as_ref() else {
        return SweepAction::Skip(SkipReason::MissingSla);
    };
    if sla.target_resolution_time == 0 {
        return SweepAction::Skip(SkipReason::ZeroTarget);
    }
    let Some(evaluation) = evaluate_sla(ticket, now) else {
        return SweepAction::Skip(SkipReason::MissingSla);
    };

    let at_threshold = evaluation.sla_status != SlaStatus::Compliant;
    if at_threshold && ticket.priority != Priority::Critical && !ticket.escalated {
        let reason = format!("SLA at {}%", whole_percent(&evaluation));
        return SweepAction::Escalate { evaluation, reason };
    }

    if evaluation.sla_status != sla.sla_status {
        return SweepAction::Refresh {
            from: sla.sla_status,
            to: evaluation.sla_status,
        };
    }

    SweepAction::Unchanged
}

fn whole_percent(evaluation: &SlaEvaluation) -> u32 {
    evaluation.percentage().round() as u32
}

/// Runs escalation sweeps against a ticket store.
pub struct EscalationEngine {
    store: SharedTicketStore,
    config: EscalationConfig,
}

impl EscalationEngine {
    pub fn new(store: SharedTicketStore) -> Self {
        Self {
            store,
            config: EscalationConfig::default(),
        }
    }

    pub fn with_config(store: SharedTicketStore, config: EscalationConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Evaluate every active ticket once and apply the resulting patches.
    ///
    /// Every write is conditional on the ticket still being active, so a
    /// ticket resolved after the scan keeps its final verdict and is counted
    /// as skipped. Undecodable documents and per-ticket errors are logged and
    /// collected in the report. A failure to list active tickets yields an
    /// empty report.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::empty(now);

        let mut query = TicketQuery::active();
        query.limit = self.config.batch_limit;

        let scan = match self.store.scan(&query).await {
            Ok(scan) => scan,
            Err(e) => {
                error!(error = %e, "SLA sweep could not list active tickets");
                return report;
            }
        };
        for rejected in &scan.rejected {
            error!(
                ticket_id = %rejected.ticket_id,
                error = %rejected.error,
                "SLA sweep cannot read stored ticket"
            );
            report.failures.push(SweepFailure {
                ticket_id: rejected.ticket_id.clone(),
                error: rejected.error.to_string(),
            });
        }
        let tickets = scan.tickets;
        report.scanned = tickets.len();

        for ticket in &tickets {
            match plan(ticket, now) {
                SweepAction::Escalate { evaluation, reason } => {
                    let patch = TicketPatch {
                        priority: Some(Priority::Critical),
                        escalated: Some(true),
                        escalated_at: Some(now),
                        escalation_reason: Some(reason.clone()),
                        sla_status: Some(evaluation.sla_status),
                        updated_at: Some(now),
                        ..TicketPatch::default()
                    }
                    .only_if_active();
                    match self.store.update_fields(&ticket.ticket_id, &patch).await {
                        Ok(_) => {
                            info!(
                                ticket_id = %ticket.ticket_id,
                                previous_priority = %ticket.priority,
                                sla_status = %evaluation.sla_status,
                                "Escalated ticket - {}",
                                reason
                            );
                            report.escalations.push(EscalationEvent {
                                ticket_id: ticket.ticket_id.clone(),
                                title: ticket.title.clone(),
                                sla_percentage: whole_percent(&evaluation),
                                previous_priority: ticket.priority,
                                sla_status: evaluation.sla_status,
                                escalated_at: now,
                            });
                        }
                        Err(e) => record_write_error(&mut report, ticket, e),
                    }
                }
                SweepAction::Refresh { from, to } => {
                    let patch = TicketPatch {
                        sla_status: Some(to),
                        updated_at: Some(now),
                        ..TicketPatch::default()
                    }
                    .only_if_active();
                    match self.store.update_fields(&ticket.ticket_id, &patch).await {
                        Ok(_) => {
                            debug!(
                                ticket_id = %ticket.ticket_id,
                                from = %from,
                                to = %to,
                                "Refreshed SLA status"
                            );
                            report.refreshed.push(SlaRefresh {
                                ticket_id: ticket.ticket_id.clone(),
                                from,
                                to,
                            });
                        }
                        Err(e) => record_write_error(&mut report, ticket, e),
                    }
                }
                SweepAction::Unchanged => {}
                SweepAction::Skip(reason) => {
                    debug!(ticket_id = %ticket.ticket_id, ?reason, "Skipping ticket in SLA sweep");
                    report.skipped += 1;
                }
            }
        }

        if !report.escalations.is_empty() {
            warn!(count = report.escalations.len(), "Escalated tickets");
        }
        info!(
            scanned = report.scanned,
            escalated = report.escalations.len(),
            refreshed = report.refreshed.len(),
            skipped = report.skipped,
            failed = report.failures.len(),
            "SLA sweep complete"
        );

        report
    }
}

fn record_write_error(report: &mut SweepReport, ticket: &Ticket, e: StoreError) {
    if let StoreError::Inactive(_) = e {
        debug!(ticket_id = %ticket.ticket_id, "Ticket resolved during SLA sweep, write skipped");
        report.skipped += 1;
        return;
    }
    warn!(ticket_id = %ticket.ticket_id, error = %e, "SLA sweep failed for ticket");
    report.failures.push(SweepFailure {
        ticket_id: ticket.ticket_id.clone(),
        error: e.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{sample_ticket, sample_ticket_with_priority};
    use crate::state::store::{RejectedTicket, TicketScan};
    use crate::state::{MemoryTicketStore, StoreResult, TicketStore};
    use crate::ticket::{Comment, Resolution, TicketStatus};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 6, 0, 0).unwrap()
    }

    // ── plan ────────────────────────────────────────────────────────────

    #[test]
    fn test_plan_escalates_at_threshold() {
        let ticket = sample_ticket("t", "u", t0());
        let action = plan(&ticket, t0() + Duration::minutes(1200));
        match action {
            SweepAction::Escalate { evaluation, reason } => {
                assert_eq!(evaluation.sla_status, SlaStatus::AtRisk);
                assert_eq!(reason, "SLA at 83%");
            }
            other => panic!("expected escalation, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_below_threshold_is_unchanged() {
        let ticket = sample_ticket("t", "u", t0());
        assert_eq!(
            plan(&ticket, t0() + Duration::minutes(1151)),
            SweepAction::Unchanged
        );
    }

    #[test]
    fn test_plan_never_escalates_critical() {
        let ticket = sample_ticket_with_priority("t", Priority::Critical, t0());
        let action = plan(&ticket, t0() + Duration::minutes(100));
        assert_eq!(
            action,
            SweepAction::Refresh {
                from: SlaStatus::Compliant,
                to: SlaStatus::AtRisk
            }
        );
    }

    #[test]
    fn test_plan_escalated_ticket_only_refreshes() {
        let mut ticket = sample_ticket("t", "u", t0());
        ticket.escalated = true;
        ticket.priority = Priority::Critical;
        ticket.sla.as_mut().unwrap().sla_status = SlaStatus::AtRisk;

        assert_eq!(
            plan(&ticket, t0() + Duration::minutes(1300)),
            SweepAction::Unchanged
        );
        assert_eq!(
            plan(&ticket, t0() + Duration::minutes(1440)),
            SweepAction::Refresh {
                from: SlaStatus::AtRisk,
                to: SlaStatus::Breached
            }
        );
    }

    #[test]
    fn test_plan_first_seen_past_target_escalates_as_breached() {
        let ticket = sample_ticket_with_priority("t", Priority::High, t0());
        match plan(&ticket, t0() + Duration::minutes(600)) {
            SweepAction::Escalate { evaluation, reason } => {
                assert_eq!(evaluation.sla_status, SlaStatus::Breached);
                assert_eq!(reason, "SLA at 125%");
            }
            other => panic!("expected escalation, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_skips() {
        let mut legacy = sample_ticket("t", "u", t0());
        legacy.sla = None;
        assert_eq!(
            plan(&legacy, t0() + Duration::days(30)),
            SweepAction::Skip(SkipReason::MissingSla)
        );

        let mut zero = sample_ticket("t", "u", t0());
        zero.sla.as_mut().unwrap().target_resolution_time = 0;
        assert_eq!(
            plan(&zero, t0() + Duration::days(30)),
            SweepAction::Skip(SkipReason::ZeroTarget)
        );

        let mut resolved = sample_ticket("t", "u", t0());
        resolved.status = TicketStatus::Resolved;
        assert_eq!(
            plan(&resolved, t0() + Duration::days(30)),
            SweepAction::Skip(SkipReason::Inactive)
        );
    }

    // ── sweep ───────────────────────────────────────────────────────────

    async fn store_with(tickets: Vec<Ticket>) -> Arc<MemoryTicketStore> {
        let store = Arc::new(MemoryTicketStore::new());
        for t in &tickets {
            store.set(t).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_sweep_escalates_and_is_idempotent() {
        let store = store_with(vec![sample_ticket("t-1", "u", t0())]).await;
        let engine = EscalationEngine::new(store.clone());

        let now = t0() + Duration::minutes(1200);
        let first = engine.sweep(now).await;
        assert_eq!(first.escalated_ids(), vec!["t-1"]);
        assert_eq!(first.escalations[0].sla_percentage, 83);
        assert_eq!(first.escalations[0].previous_priority, Priority::Medium);

        let after_first = store.get("t-1").await.unwrap().unwrap();
        assert!(after_first.escalated);
        assert_eq!(after_first.priority, Priority::Critical);
        assert_eq!(after_first.escalated_at, Some(now));
        assert_eq!(after_first.escalation_reason.as_deref(), Some("SLA at 83%"));
        assert_eq!(
            after_first.sla.as_ref().unwrap().sla_status,
            SlaStatus::AtRisk
        );
        assert_eq!(after_first.sla.as_ref().unwrap().target_resolution_time, 1440);

        let second = engine.sweep(now).await;
        assert!(second.escalations.is_empty());
        assert!(second.refreshed.is_empty());
        assert_eq!(store.get("t-1").await.unwrap().unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_sweep_event_reports_breached_when_first_seen_past_target() {
        let store = store_with(vec![sample_ticket("t-1", "u", t0())]).await;
        let engine = EscalationEngine::new(store.clone());

        // 1500 of 1440 minutes, never swept before
        let report = engine.sweep(t0() + Duration::minutes(1500)).await;
        assert_eq!(report.escalated_ids(), vec!["t-1"]);
        let event = &report.escalations[0];
        assert_eq!(event.sla_status, SlaStatus::Breached);
        assert_eq!(event.sla_percentage, 104);

        let ticket = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(ticket.priority, Priority::Critical);
        assert_eq!(ticket.sla.unwrap().sla_status, event.sla_status);
        assert_eq!(ticket.escalation_reason.as_deref(), Some("SLA at 104%"));
    }

    #[tokio::test]
    async fn test_sweep_never_latches_critical_tickets() {
        let store = store_with(vec![sample_ticket_with_priority(
            "crit",
            Priority::Critical,
            t0(),
        )])
        .await;
        let engine = EscalationEngine::new(store.clone());

        for minutes in [50, 100, 119, 120, 500] {
            let report = engine.sweep(t0() + Duration::minutes(minutes)).await;
            assert!(report.escalations.is_empty());
        }

        let ticket = store.get("crit").await.unwrap().unwrap();
        assert!(!ticket.escalated);
        assert!(ticket.escalated_at.is_none());
        assert_eq!(ticket.sla.unwrap().sla_status, SlaStatus::Breached);
    }

    #[tokio::test]
    async fn test_sweep_refreshes_escalated_ticket_to_breached() {
        let store = store_with(vec![sample_ticket("t-1", "u", t0())]).await;
        let engine = EscalationEngine::new(store.clone());

        engine.sweep(t0() + Duration::minutes(1200)).await;
        let report = engine.sweep(t0() + Duration::minutes(1500)).await;

        assert!(report.escalations.is_empty());
        assert_eq!(
            report.refreshed,
            vec![SlaRefresh {
                ticket_id: "t-1".to_string(),
                from: SlaStatus::AtRisk,
                to: SlaStatus::Breached,
            }]
        );
        let ticket = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(ticket.escalated_at, Some(t0() + Duration::minutes(1200)));
        assert_eq!(ticket.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_sweep_ignores_resolved_and_counts_skips() {
        let mut resolved = sample_ticket("done", "u", t0());
        resolved.status = TicketStatus::Resolved;
        let mut legacy = sample_ticket("legacy", "u", t0());
        legacy.sla = None;

        let store = store_with(vec![resolved.clone(), legacy]).await;
        let engine = EscalationEngine::new(store.clone());
        let report = engine.sweep(t0() + Duration::days(10)).await;

        assert_eq!(report.scanned, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.escalations.is_empty());
        assert_eq!(store.get("done").await.unwrap().unwrap(), resolved);
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_limit() {
        let store = store_with(vec![
            sample_ticket("t-1", "u", t0()),
            sample_ticket("t-2", "u", t0() + Duration::minutes(1)),
        ])
        .await;
        let engine = EscalationEngine::with_config(
            store.clone(),
            EscalationConfig {
                batch_limit: Some(1),
            },
        );

        let report = engine.sweep(t0() + Duration::minutes(1300)).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.escalated_ids(), vec!["t-1"]);
    }

    /// Store wrapper with scripted misbehaviour around a memory store.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryTicketStore,
        /// Writes to this ticket fail.
        poisoned: Option<String>,
        /// Resolve every scanned ticket right after the scan returns.
        resolve_after_scan: bool,
        /// Reported by `scan` as undecodable.
        unreadable: Vec<String>,
    }

    #[async_trait]
    impl TicketStore for FlakyStore {
        async fn get(&self, id: &str) -> StoreResult<Option<Ticket>> {
            self.inner.get(id).await
        }
        async fn set(&self, ticket: &Ticket) -> StoreResult<()> {
            self.inner.set(ticket).await
        }
        async fn update_fields(&self, id: &str, patch: &TicketPatch) -> StoreResult<Ticket> {
            if self.poisoned.as_deref() == Some(id) {
                return Err(StoreError::Serialization("disk full".to_string()));
            }
            self.inner.update_fields(id, patch).await
        }
        async fn query(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>> {
            self.inner.query(query).await
        }
        async fn scan(&self, query: &TicketQuery) -> StoreResult<TicketScan> {
            let tickets = self.inner.query(query).await?;
            if self.resolve_after_scan {
                for t in &tickets {
                    let patch = TicketPatch {
                        status: Some(TicketStatus::Resolved),
                        sla_status: Some(SlaStatus::Compliant),
                        sla_resolution_time: Some(1200),
                        ..TicketPatch::default()
                    };
                    self.inner.update_fields(&t.ticket_id, &patch).await?;
                }
            }
            let rejected = self
                .unreadable
                .iter()
                .map(|id| RejectedTicket {
                    ticket_id: id.clone(),
                    error: StoreError::InvalidPriority {
                        ticket_id: id.clone(),
                        value: "urgent".to_string(),
                    },
                })
                .collect();
            Ok(TicketScan { tickets, rejected })
        }
        async fn add_resolution(&self, id: &str, r: &Resolution) -> StoreResult<()> {
            self.inner.add_resolution(id, r).await
        }
        async fn resolutions(&self, id: &str) -> StoreResult<Vec<Resolution>> {
            self.inner.resolutions(id).await
        }
        async fn add_comment(&self, id: &str, c: &Comment) -> StoreResult<()> {
            self.inner.add_comment(id, c).await
        }
        async fn comments(&self, id: &str) -> StoreResult<Vec<Comment>> {
            self.inner.comments(id).await
        }
    }

    #[tokio::test]
    async fn test_sweep_collects_per_ticket_failures_and_continues() {
        let inner = MemoryTicketStore::new();
        inner.set(&sample_ticket("bad", "u", t0())).await.unwrap();
        inner
            .set(&sample_ticket("good", "u", t0() + Duration::minutes(1)))
            .await
            .unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            poisoned: Some("bad".to_string()),
            ..FlakyStore::default()
        });
        let engine = EscalationEngine::new(store.clone());

        let report = engine.sweep(t0() + Duration::minutes(1300)).await;

        assert_eq!(report.escalated_ids(), vec!["good"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticket_id, "bad");
        assert!(report.failures[0].error.contains("disk full"));
        assert!(!store.get("bad").await.unwrap().unwrap().escalated);
    }

    #[tokio::test]
    async fn test_sweep_does_not_overwrite_ticket_resolved_mid_sweep() {
        let inner = MemoryTicketStore::new();
        inner.set(&sample_ticket("t-1", "u", t0())).await.unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            resolve_after_scan: true,
            ..FlakyStore::default()
        });
        let engine = EscalationEngine::new(store.clone());

        let report = engine.sweep(t0() + Duration::minutes(1200)).await;

        assert!(report.escalations.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.skipped, 1);

        let ticket = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Resolved);
        assert!(!ticket.escalated);
        assert_eq!(ticket.priority, Priority::Medium);
        let sla = ticket.sla.unwrap();
        assert_eq!(sla.sla_status, SlaStatus::Compliant);
        assert_eq!(sla.resolution_time, Some(1200));
    }

    #[tokio::test]
    async fn test_sweep_reports_unreadable_documents() {
        let inner = MemoryTicketStore::new();
        inner.set(&sample_ticket("t-1", "u", t0())).await.unwrap();
        let store = Arc::new(FlakyStore {
            inner,
            unreadable: vec!["t-legacy".to_string()],
            ..FlakyStore::default()
        });
        let engine = EscalationEngine::new(store);

        let report = engine.sweep(t0() + Duration::minutes(1200)).await;

        assert_eq!(report.escalated_ids(), vec!["t-1"]);
        assert_eq!(report.scanned, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticket_id, "t-legacy");
        assert!(report.failures[0].error.contains("invalid priority"));
    }
}
