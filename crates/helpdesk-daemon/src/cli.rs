//! `helpdeskd` command line.
//!
//! `run` starts the periodic SLA sweep. The other subcommands are one-shot
//! operator tools that print JSON to stdout. With the memory backend every
//! invocation starts from an empty store, so `create` / `resolve` / `show` /
//! `similar` are only useful against `--store rocksdb`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use triage::reporting::{analytics, sla_stats};
use triage::{
    open_store, Actor, EscalationEngine, HelpdeskConfig, Priority, Role, StoreBackend,
    TicketQuery, TicketService,
};

use crate::scheduler::SweepScheduler;

#[derive(Debug, Parser)]
#[command(name = "helpdeskd", version, about = "Helpdesk triage and SLA escalation daemon")]
pub struct Cli {
    /// TOML config file (falls back to $HELPDESK_CONFIG).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the NLP classification service base URL.
    #[arg(long, global = true)]
    pub nlp_url: Option<String>,

    /// Disable the remote classifier and use keyword rules only.
    #[arg(long, global = true)]
    pub rules_only: bool,

    #[arg(long, value_enum, global = true)]
    pub store: Option<BackendArg>,

    /// State directory for the rocksdb backend.
    #[arg(long, global = true)]
    pub state_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Memory,
    Rocksdb,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => StoreBackend::Memory,
            BackendArg::Rocksdb => StoreBackend::Rocksdb,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the periodic SLA sweep until interrupted.
    Run,
    /// Run a single sweep now and print the report.
    Sweep,
    /// Classify a title/description pair without storing anything.
    Classify {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
    /// Evaluate the SLA for a priority and creation time.
    Evaluate {
        #[arg(long)]
        priority: Priority,
        /// RFC 3339 creation timestamp.
        #[arg(long)]
        created_at: DateTime<Utc>,
        /// Evaluation instant (defaults to now).
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Create a ticket on behalf of a customer.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        user: String,
    },
    /// Resolve a ticket as an engineer.
    Resolve {
        #[arg(long)]
        id: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        engineer: String,
    },
    /// Print a ticket with its comments and latest resolution.
    Show {
        #[arg(long)]
        id: String,
    },
    /// Print resolved tickets similar to this one.
    Similar {
        #[arg(long)]
        id: String,
    },
    /// Print SLA compliance and analytics over the whole store.
    Stats,
}

impl Cli {
    /// Fold command-line overrides into a loaded config.
    pub fn apply_overrides(&self, config: &mut HelpdeskConfig) {
        if let Some(url) = &self.nlp_url {
            config.nlp.base_url = url.clone();
        }
        if self.rules_only {
            config.nlp.enabled = false;
        }
        if let Some(backend) = self.store {
            config.store.backend = backend.into();
        }
        if let Some(path) = &self.state_path {
            config.store.path = path.clone();
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}

fn operator(uid: &str, role: Role) -> Actor {
    Actor::new(uid, format!("{}@helpdeskd.local", uid), role)
}

/// Execute one parsed command against `config`.
pub async fn execute(command: Command, config: HelpdeskConfig) -> Result<()> {
    if let Command::Evaluate {
        priority,
        created_at,
        now,
    } = command
    {
        let evaluation = triage::evaluate(created_at, priority, now.unwrap_or_else(Utc::now));
        return print_json(&evaluation);
    }

    let classifier = Arc::new(config.nlp.build_engine()?);
    if let Command::Classify { title, description } = &command {
        return print_json(&classifier.classify(title, description).await);
    }

    let store = open_store(&config.store)?;
    let engine = Arc::new(EscalationEngine::with_config(
        store.clone(),
        config.sweep.escalation(),
    ));
    let service = TicketService::new(store.clone(), classifier);

    match command {
        Command::Run => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, stopping after the current sweep");
                    on_signal.cancel();
                }
            });
            SweepScheduler::from_config(engine, &config.sweep)
                .run(cancel)
                .await;
            Ok(())
        }
        Command::Sweep => {
            let report = SweepScheduler::from_config(engine, &config.sweep)
                .run_once()
                .await;
            print_json(&report)
        }
        Command::Create {
            title,
            description,
            user,
        } => {
            let created = service
                .create_ticket(&title, &description, &operator(&user, Role::Customer))
                .await?;
            print_json(&created)
        }
        Command::Resolve { id, text, engineer } => {
            let outcome = service
                .resolve_ticket(&id, &text, &operator(&engineer, Role::Engineer))
                .await?;
            print_json(&outcome)
        }
        Command::Show { id } => {
            let detail = service
                .get_ticket(&id, &operator("helpdeskd", Role::Admin))
                .await?;
            print_json(&detail)
        }
        Command::Similar { id } => {
            let recommendations = service
                .recommendations(&id, &operator("helpdeskd", Role::Admin))
                .await?;
            print_json(&recommendations)
        }
        Command::Stats => {
            let tickets = store.query(&TicketQuery::all()).await?;
            print_json(&serde_json::json!({
                "sla": sla_stats(&tickets),
                "analytics": analytics(&tickets),
            }))
        }
        Command::Evaluate { .. } | Command::Classify { .. } => Ok(()),
    }
}
