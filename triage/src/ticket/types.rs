//! Persisted ticket types.
//!
//! Field names follow the document layout existing reporting consumers
//! read (`createdAt`, `sla.targetResolutionTime`, `sla.slaStatus`, ...), so
//! every record here serializes in camelCase and the enums use the same
//! lower/snake-case strings as the stored documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TriageError;

/// Unique identifier for tickets
pub type TicketId = String;

/// Ticket priority, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All priorities, most severe first.
    pub fn all() -> &'static [Priority] {
        &[
            Priority::Critical,
            Priority::High,
            Priority::Medium,
            Priority::Low,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(TriageError::InvalidPriority(s.to_string())),
        }
    }
}

/// Ticket category as assigned by classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Payment,
    Authentication,
    Api,
    Performance,
    Bug,
    Feature,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Authentication => "authentication",
            Self::Api => "api",
            Self::Performance => "performance",
            Self::Bug => "bug",
            Self::Feature => "feature",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "payment" => Ok(Self::Payment),
            "authentication" => Ok(Self::Authentication),
            "api" => Ok(Self::Api),
            "performance" => Ok(Self::Performance),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            other => Err(TriageError::validation(format!(
                "unknown category {:?}",
                other
            ))),
        }
    }
}

/// Ticket status. Forward-only: open → in_progress → resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(TriageError::validation(format!(
                "unknown status {:?}",
                other
            ))),
        }
    }
}

/// SLA state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Compliant,
    AtRisk,
    Breached,
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compliant => write!(f, "compliant"),
            Self::AtRisk => write!(f, "at_risk"),
            Self::Breached => write!(f, "breached"),
        }
    }
}

/// Embedded `sla` sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaRecord {
    /// Minutes, fixed at creation from the priority predicted then.
    pub target_resolution_time: u32,
    pub sla_status: SlaStatus,
    /// Not tracked yet; always null.
    pub first_response_time: Option<i64>,
    /// Minutes from creation to resolution, null until resolved.
    pub resolution_time: Option<i64>,
}

impl SlaRecord {
    pub fn new(target_resolution_time: u32) -> Self {
        Self {
            target_resolution_time,
            sla_status: SlaStatus::Compliant,
            first_response_time: None,
            resolution_time: None,
        }
    }
}

/// Embedded `classification` sub-record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationRecord {
    pub predicted_category: Category,
    pub predicted_priority: Priority,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub classified_at: DateTime<Utc>,
}

/// Customer satisfaction rating left by the ticket creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub score: u8,
    pub feedback: String,
    pub rated_at: DateTime<Utc>,
    pub rated_by: String,
}

/// A support ticket as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub category: Category,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub classification: ClassificationRecord,
    /// Absent on legacy documents; the sweep skips those.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<SlaRecord>,
    #[serde(default)]
    pub escalated: bool,
    #[serde(default)]
    pub escalated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl Ticket {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Resolution record, stored separately from the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub resolution_id: String,
    pub engineer_id: String,
    pub resolution_text: String,
    pub resolved_at: DateTime<Utc>,
    pub resolution_time_minutes: i64,
}

/// Comment on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    pub user_id: String,
    pub user_name: String,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
}

/// Role of the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Engineer,
    Admin,
}

impl Role {
    /// Engineers and admins may update, assign and resolve tickets.
    pub fn can_triage(&self) -> bool {
        matches!(self, Self::Engineer | Self::Admin)
    }
}

impl FromStr for Role {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "engineer" => Ok(Self::Engineer),
            "admin" => Ok(Self::Admin),
            other => Err(TriageError::validation(format!("unknown role {:?}", other))),
        }
    }
}

/// Already-authenticated caller identity.
///
/// Token verification happens before the core is reached; operations only
/// see the resolved uid and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub uid: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(uid: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            role,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown on comments; falls back to the email address.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&SlaStatus::AtRisk).unwrap(),
            "\"at_risk\""
        );
        assert_eq!(
            serde_json::to_string(&Priority::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::to_string(&Category::Authentication).unwrap(),
            "\"authentication\""
        );
    }

    #[test]
    fn test_priority_parse_rejects_unknown() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(matches!(err, TriageError::InvalidPriority(ref p) if p == "urgent"));
    }

    #[test]
    fn test_sla_record_field_names() {
        let value = serde_json::to_value(SlaRecord::new(1440)).unwrap();
        assert_eq!(value["targetResolutionTime"], 1440);
        assert_eq!(value["slaStatus"], "compliant");
        assert!(value["firstResponseTime"].is_null());
        assert!(value["resolutionTime"].is_null());
    }

    #[test]
    fn test_legacy_document_without_sla_deserializes() {
        let doc = serde_json::json!({
            "ticketId": "t-legacy",
            "userId": "cust-1",
            "title": "Old ticket",
            "description": "Imported before SLA tracking",
            "status": "open",
            "category": "bug",
            "priority": "medium",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z",
            "classification": {
                "predictedCategory": "bug",
                "predictedPriority": "medium",
                "confidenceScore": 0.5,
                "classifiedAt": "2025-01-01T00:00:00Z"
            }
        });
        let ticket: Ticket = serde_json::from_value(doc).unwrap();
        assert!(ticket.sla.is_none());
        assert!(!ticket.escalated);
        assert!(ticket.closed_at.is_none());
    }

    #[test]
    fn test_actor_label_falls_back_to_email() {
        let actor = Actor::new("u1", "u1@example.com", Role::Customer);
        assert_eq!(actor.label(), "u1@example.com");
        assert_eq!(actor.with_display_name("Una").label(), "Una");
    }
}
