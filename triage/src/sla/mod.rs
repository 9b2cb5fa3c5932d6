//! SLA policy table and evaluator.
//!
//! | priority | target |
//! |----------|--------|
//! | critical | 2 h    |
//! | high     | 8 h    |
//! | medium   | 24 h   |
//! | low      | 72 h   |
//!
//! A ticket is at risk from 80% of its target and breached at 100%.

pub mod evaluator;
pub mod policy;

pub use evaluator::{
    elapsed_minutes, evaluate, evaluate_against_target, evaluate_sla, final_verdict, status_for,
    SlaEvaluation,
};
pub use policy::{target_minutes, target_minutes_for, AT_RISK_PERCENT};
