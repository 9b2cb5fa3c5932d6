//! Helpdesk triage core
//!
//! This library provides:
//! - Ticket classification against a remote NLP service, with a keyword rule
//!   fallback that is used whenever the service is slow, down or wrong
//! - A fixed four-tier SLA policy and a pure evaluator for it
//! - An escalation sweep that promotes tickets nearing their SLA to critical
//! - The ticket lifecycle around those pieces: create, resolve, update,
//!   assign, comment, rate and role-filtered reads
//!
//! # Modules
//!
//! - `classifier`: `ClassificationEngine`, `HttpClassifier`, `RuleClassifier`
//! - `sla`: policy table and evaluator
//! - `escalation`: `EscalationEngine::sweep`
//! - `lifecycle`: `TicketService`
//! - `state`: `TicketStore` trait, in-memory store, RocksDB store
//!   (`persistent-store` feature)
//! - `reporting`: SLA stats, analytics and trends
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use triage::{ClassificationEngine, EscalationEngine, MemoryTicketStore, TicketService};
//!
//! let store = MemoryTicketStore::new().shared();
//! let service = TicketService::new(store.clone(), Arc::new(ClassificationEngine::rules_only()));
//! let created = service.create_ticket("Refund", "please refund asap", &actor).await?;
//!
//! let report = EscalationEngine::new(store).sweep(chrono::Utc::now()).await;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod reporting;
pub mod sla;
pub mod state;
pub mod ticket;

pub use classifier::{
    ClassificationEngine, ClassificationMethod, ClassificationResult, ClassifyError,
    HttpClassifier, Recommendations, RemoteClassification, RemoteClassifier, ResolvedCandidate,
    RuleClassifier, SimilarTicket,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HelpdeskConfig, NlpConfig, StoreBackend, StoreConfig, SweepConfig};
pub use error::{TriageError, TriageResult};
pub use escalation::{
    EscalationConfig, EscalationEngine, EscalationEvent, SlaRefresh, SweepFailure, SweepReport,
};
pub use lifecycle::{
    CreatedTicket, ResolutionOutcome, TicketDetail, TicketFilter, TicketService, TicketUpdate,
};
pub use sla::{evaluate, evaluate_sla, target_minutes, SlaEvaluation};
pub use state::{
    open_store, MemoryTicketStore, RejectedTicket, SharedTicketStore, StoreError, TicketPatch,
    TicketQuery, TicketScan, TicketStore,
};
pub use ticket::{
    Actor, Category, Comment, Priority, Rating, Resolution, Role, SlaRecord, SlaStatus, Ticket,
    TicketStatus,
};
