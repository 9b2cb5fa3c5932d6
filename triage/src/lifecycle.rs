//! Ticket lifecycle: creation, resolution, and the triage operations around
//! them (update, assignment, comments, rating, role-filtered reads).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{
    ClassificationEngine, ClassificationResult, Recommendations, ResolvedCandidate,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{TriageError, TriageResult};
use crate::sla::{elapsed_minutes, evaluate_sla, final_verdict, target_minutes, SlaEvaluation};
use crate::state::{SharedTicketStore, TicketPatch, TicketQuery};
use crate::ticket::{
    Actor, Category, Comment, Priority, Rating, Resolution, Role, SlaRecord, SlaStatus, Ticket,
    TicketId, TicketStatus,
};

/// Resolved tickets offered to the similarity search per request.
const SIMILARITY_POOL: usize = 50;

/// A freshly created ticket plus the classification that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTicket {
    pub ticket: Ticket,
    pub classification: ClassificationResult,
}

/// Result of resolving a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionOutcome {
    pub ticket_id: TicketId,
    pub resolution_time_minutes: i64,
    pub sla_status: SlaStatus,
}

/// Manual changes an engineer can make. `None` leaves a field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    /// `Some(None)` unassigns.
    pub assigned_to: Option<Option<String>>,
    pub priority: Option<Priority>,
}

/// Ticket with its comments and most recent resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub comments: Vec<Comment>,
    pub resolution: Option<Resolution>,
}

/// List filters on top of the role-based visibility rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
    /// Engineers only: restrict to tickets assigned to the caller.
    #[serde(default)]
    pub assigned_to_me: bool,
}

/// Entry point for ticket operations.
pub struct TicketService {
    store: SharedTicketStore,
    classifier: Arc<ClassificationEngine>,
    clock: Arc<dyn Clock>,
}

impl TicketService {
    pub fn new(store: SharedTicketStore, classifier: Arc<ClassificationEngine>) -> Self {
        Self::with_clock(store, classifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: SharedTicketStore,
        classifier: Arc<ClassificationEngine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            classifier,
            clock,
        }
    }

    pub fn store(&self) -> &SharedTicketStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // Creation and resolution
    // =========================================================================

    /// Classify and persist a new ticket.
    ///
    /// The SLA target comes from the predicted priority and is never
    /// recomputed afterwards.
    pub async fn create_ticket(
        &self,
        title: &str,
        description: &str,
        requester: &Actor,
    ) -> TriageResult<CreatedTicket> {
        if title.trim().is_empty() || description.trim().is_empty() {
            return Err(TriageError::validation("Title and description are required"));
        }

        let classification = self.classifier.classify(title, description).await;
        let now = self.clock.now();

        let ticket = Ticket {
            ticket_id: Uuid::new_v4().to_string(),
            user_id: requester.uid.clone(),
            title: title.to_string(),
            description: description.to_string(),
            status: TicketStatus::Open,
            category: classification.category,
            priority: classification.priority,
            created_at: now,
            updated_at: now,
            classification: classification.to_record(now),
            sla: Some(SlaRecord::new(target_minutes(classification.priority))),
            escalated: false,
            escalated_at: None,
            escalation_reason: None,
            assigned_to: None,
            closed_at: None,
            rating: None,
        };

        self.store.set(&ticket).await?;

        info!(
            ticket_id = %ticket.ticket_id,
            user_id = %ticket.user_id,
            category = %ticket.category,
            priority = %ticket.priority,
            method = %classification.method,
            "Ticket created"
        );

        Ok(CreatedTicket {
            ticket,
            classification,
        })
    }

    /// Resolve a ticket and freeze its SLA verdict.
    ///
    /// Resolving an already-resolved ticket overwrites the previous verdict
    /// and appends another resolution record.
    pub async fn resolve_ticket(
        &self,
        ticket_id: &str,
        resolution_text: &str,
        resolver: &Actor,
    ) -> TriageResult<ResolutionOutcome> {
        require_triage_role(resolver, "resolve tickets")?;
        if resolution_text.trim().is_empty() {
            return Err(TriageError::validation("Resolution text is required"));
        }

        let ticket = self.load(ticket_id).await?;
        let target = ticket
            .sla
            .as_ref()
            .map(|sla| sla.target_resolution_time)
            .ok_or_else(|| TriageError::CorruptRecord {
                ticket_id: ticket_id.to_string(),
                reason: "missing sla sub-record".to_string(),
            })?;

        if ticket.status.is_terminal() {
            warn!(ticket_id, "Resolving an already resolved ticket; previous verdict is overwritten");
        }

        let now = self.clock.now();
        let resolution_time = elapsed_minutes(ticket.created_at, now);
        let sla_status = final_verdict(resolution_time, target);

        let resolution = Resolution {
            resolution_id: Uuid::new_v4().to_string(),
            engineer_id: resolver.uid.clone(),
            resolution_text: resolution_text.to_string(),
            resolved_at: now,
            resolution_time_minutes: resolution_time,
        };
        self.store.add_resolution(ticket_id, &resolution).await?;

        let patch = TicketPatch {
            status: Some(TicketStatus::Resolved),
            closed_at: Some(now),
            updated_at: Some(now),
            sla_resolution_time: Some(resolution_time),
            sla_status: Some(sla_status),
            ..TicketPatch::default()
        };
        self.store.update_fields(ticket_id, &patch).await?;

        info!(
            ticket_id,
            engineer_id = %resolver.uid,
            resolution_time_minutes = resolution_time,
            target_minutes = target,
            sla_status = %sla_status,
            "Ticket resolved"
        );

        Ok(ResolutionOutcome {
            ticket_id: ticket_id.to_string(),
            resolution_time_minutes: resolution_time,
            sla_status,
        })
    }

    // =========================================================================
    // Triage
    // =========================================================================

    /// Manual overwrite by an engineer or admin.
    ///
    /// Status changes here are not guarded by the state machine. A manual
    /// priority change keeps the SLA target and the escalation latch.
    pub async fn update_ticket(
        &self,
        ticket_id: &str,
        update: TicketUpdate,
        actor: &Actor,
    ) -> TriageResult<Ticket> {
        require_triage_role(actor, "update tickets")?;
        let ticket = self.load(ticket_id).await?;
        let now = self.clock.now();

        let mut patch = TicketPatch::touched(now);
        if let Some(status) = update.status {
            if !ticket.status.can_advance_to(status) {
                debug!(ticket_id, from = %ticket.status, to = %status, "Manual status overwrite");
            }
            patch.status = Some(status);
            if status == TicketStatus::Resolved {
                patch.closed_at = Some(now);
            }
        }
        patch.assigned_to = update.assigned_to;
        patch.priority = update.priority;

        let updated = self.store.update_fields(ticket_id, &patch).await?;
        info!(ticket_id, actor = %actor.uid, status = %updated.status, priority = %updated.priority, "Ticket updated");
        Ok(updated)
    }

    /// Assign to an engineer, moving an open ticket to in_progress.
    pub async fn assign_ticket(
        &self,
        ticket_id: &str,
        engineer_id: &str,
        actor: &Actor,
    ) -> TriageResult<Ticket> {
        require_triage_role(actor, "assign tickets")?;
        if engineer_id.trim().is_empty() {
            return Err(TriageError::validation("Assignee is required"));
        }

        let ticket = self.load(ticket_id).await?;
        let status = ticket.status.advance(TicketStatus::InProgress)?;

        let patch = TicketPatch {
            status: Some(status),
            assigned_to: Some(Some(engineer_id.to_string())),
            updated_at: Some(self.clock.now()),
            ..TicketPatch::default()
        };
        let updated = self.store.update_fields(ticket_id, &patch).await?;
        info!(ticket_id, engineer_id, "Ticket assigned");
        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        ticket_id: &str,
        text: &str,
        actor: &Actor,
    ) -> TriageResult<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::validation("Comment text is required"));
        }
        let ticket = self.load(ticket_id).await?;
        ensure_visible(&ticket, actor)?;

        let now = self.clock.now();
        let comment = Comment {
            comment_id: Uuid::new_v4().to_string(),
            user_id: actor.uid.clone(),
            user_name: actor.label().to_string(),
            comment_text: text.to_string(),
            created_at: now,
        };
        self.store.add_comment(ticket_id, &comment).await?;
        self.store
            .update_fields(ticket_id, &TicketPatch::touched(now))
            .await?;

        debug!(ticket_id, comment_id = %comment.comment_id, "Comment added");
        Ok(comment)
    }

    /// Satisfaction rating, creator only.
    pub async fn rate_ticket(
        &self,
        ticket_id: &str,
        score: u8,
        feedback: Option<&str>,
        actor: &Actor,
    ) -> TriageResult<Rating> {
        if !(1..=5).contains(&score) {
            return Err(TriageError::validation("Score must be between 1 and 5"));
        }
        let ticket = self.load(ticket_id).await?;
        if ticket.user_id != actor.uid {
            return Err(TriageError::forbidden("Only ticket creator can rate"));
        }

        let now = self.clock.now();
        let rating = Rating {
            score,
            feedback: feedback.unwrap_or_default().to_string(),
            rated_at: now,
            rated_by: actor.uid.clone(),
        };
        let patch = TicketPatch {
            rating: Some(rating.clone()),
            updated_at: Some(now),
            ..TicketPatch::default()
        };
        self.store.update_fields(ticket_id, &patch).await?;
        info!(ticket_id, score, "Ticket rated");
        Ok(rating)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_ticket(&self, ticket_id: &str, actor: &Actor) -> TriageResult<TicketDetail> {
        let ticket = self.load(ticket_id).await?;
        ensure_visible(&ticket, actor)?;

        let comments = self.store.comments(ticket_id).await?;
        let resolution = self.store.resolutions(ticket_id).await?.pop();

        Ok(TicketDetail {
            ticket,
            comments,
            resolution,
        })
    }

    /// Tickets visible to `actor`, oldest first.
    pub async fn list_tickets(
        &self,
        actor: &Actor,
        filter: &TicketFilter,
    ) -> TriageResult<Vec<Ticket>> {
        let mut query = TicketQuery::all();
        match actor.role {
            Role::Customer => query = query.for_user(&actor.uid),
            Role::Engineer if filter.assigned_to_me => query = query.assigned_to(&actor.uid),
            Role::Engineer | Role::Admin => {}
        }
        if let Some(status) = filter.status {
            query = query.with_status(status);
        }
        if let Some(category) = filter.category {
            query = query.with_category(category);
        }
        if let Some(priority) = filter.priority {
            query = query.with_priority(priority);
        }

        let tickets = self.store.query(&query).await?;
        debug!(actor = %actor.uid, role = ?actor.role, count = tickets.len(), "Listed tickets");
        Ok(tickets)
    }

    /// Resolved tickets whose description resembles this one, ranked by the
    /// NLP service. An unreachable service yields an empty answer.
    pub async fn recommendations(
        &self,
        ticket_id: &str,
        actor: &Actor,
    ) -> TriageResult<Recommendations> {
        let ticket = self.load(ticket_id).await?;
        ensure_visible(&ticket, actor)?;

        let resolved = self
            .store
            .query(
                &TicketQuery::all()
                    .with_status(TicketStatus::Resolved)
                    .limit(SIMILARITY_POOL),
            )
            .await?;

        let mut candidates = Vec::with_capacity(resolved.len());
        for other in resolved.into_iter().filter(|t| t.ticket_id != ticket.ticket_id) {
            // first recorded resolution; tickets without one are not offered
            let Some(resolution) = self
                .store
                .resolutions(&other.ticket_id)
                .await?
                .into_iter()
                .next()
            else {
                continue;
            };
            candidates.push(ResolvedCandidate {
                ticket_id: other.ticket_id,
                title: other.title,
                description: other.description,
                resolution: resolution.resolution_text,
                category: other.category,
            });
        }

        if candidates.is_empty() {
            debug!(ticket_id, "No resolved tickets to compare against");
            return Ok(Recommendations::empty());
        }

        let answer = self
            .classifier
            .find_similar(&ticket.description, &candidates)
            .await;
        debug!(
            ticket_id,
            candidates = candidates.len(),
            matches = answer.similar_tickets.len(),
            "Recommendations computed"
        );
        Ok(answer)
    }

    /// Live SLA state of a ticket at the service clock's current time.
    pub fn evaluate_sla(&self, ticket: &Ticket) -> Option<SlaEvaluation> {
        evaluate_sla(ticket, self.clock.now())
    }

    async fn load(&self, ticket_id: &str) -> TriageResult<Ticket> {
        self.store
            .get(ticket_id)
            .await?
            .ok_or_else(|| TriageError::NotFound(ticket_id.to_string()))
    }
}

fn require_triage_role(actor: &Actor, action: &str) -> TriageResult<()> {
    if actor.role.can_triage() {
        Ok(())
    } else {
        Err(TriageError::forbidden(format!(
            "only engineers and admins can {}",
            action
        )))
    }
}

fn ensure_visible(ticket: &Ticket, actor: &Actor) -> TriageResult<()> {
    if actor.role == Role::Customer && ticket.user_id != actor.uid {
        return Err(TriageError::forbidden("Access denied"));
    }
    Ok(())
}
