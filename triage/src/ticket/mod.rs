//! Ticket records and the status state machine they move through.

pub mod status;
pub mod types;

pub use types::{
    Actor, Category, ClassificationRecord, Comment, Priority, Rating, Resolution, Role,
    SlaRecord, SlaStatus, Ticket, TicketId, TicketStatus,
};
