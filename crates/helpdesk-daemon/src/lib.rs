//! Helpdesk daemon: sweep scheduling and the `helpdeskd` command line.

pub mod cli;
pub mod scheduler;

pub use cli::{Cli, Command};
pub use scheduler::SweepScheduler;
