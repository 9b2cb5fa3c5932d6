//! RocksDB-backed ticket store
//!
//! Documents are stored as JSON so legacy records with missing optional
//! fields still decode. Read-modify-write patches are serialized through a
//! single writer lock.
//!
//! A ticket document that does not decode is never dropped silently: `get`
//! fails with it, and [`TicketStore::scan`] hands it back as rejected so the
//! sweep can report it. An unknown priority string maps to
//! [`StoreError::InvalidPriority`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{error, warn};

use super::schema::{self, ALL_CFS};
use super::store::{
    RejectedTicket, SharedTicketStore, StoreError, StoreResult, TicketPatch, TicketQuery,
    TicketScan, TicketStore,
};
use crate::sla::target_minutes_for;
use crate::ticket::{Comment, Resolution, Ticket, TicketStatus};

/// RocksDB-backed persistent ticket store
pub struct RocksTicketStore {
    db: DB,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RocksTicketStore {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;

        Ok(Self {
            db,
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn shared(self) -> SharedTicketStore {
        Arc::new(self)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // =========================================================================
    // Generic operations
    // =========================================================================

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> StoreResult<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;

        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    /// All values under a key prefix, in key order. Undecodable values are
    /// logged and skipped.
    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(cf_name.to_string()))?;

        let mut values = Vec::new();
        for result in self.db.prefix_iterator_cf(cf, prefix.as_bytes()) {
            let (key, value) = result?;
            if !key.starts_with(prefix.as_bytes()) {
                break; // Prefix no longer matches
            }
            match serde_json::from_slice(&value) {
                Ok(v) => values.push(v),
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping undecodable record"
                ),
            }
        }

        Ok(values)
    }

    fn fetch_ticket(&self, ticket_id: &str) -> StoreResult<Option<Ticket>> {
        let cf = self
            .db
            .cf_handle(schema::CF_TICKETS)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_TICKETS.to_string()))?;

        match self.db.get_cf(cf, schema::keys::ticket(ticket_id).as_bytes())? {
            Some(bytes) => decode_ticket(ticket_id, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Every ticket document, split into decoded tickets and rejects.
    /// Rejects whose stored status is readable and outside `query` are left
    /// out so a resolved legacy record does not show up in the sweep.
    fn scan_tickets(&self, query: &TicketQuery) -> StoreResult<TicketScan> {
        let cf = self
            .db
            .cf_handle(schema::CF_TICKETS)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(schema::CF_TICKETS.to_string()))?;

        let prefix = schema::keys::TICKET_PREFIX.as_bytes();
        let mut tickets = Vec::new();
        let mut rejected = Vec::new();
        for result in self.db.prefix_iterator_cf(cf, prefix) {
            let (key, value) = result?;
            if !key.starts_with(prefix) {
                break;
            }
            let ticket_id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            match decode_ticket(&ticket_id, &value) {
                Ok(ticket) => tickets.push(ticket),
                Err(e) => {
                    let in_scope = raw_status(&value)
                        .map_or(true, |s| query.status_in.is_empty() || query.status_in.contains(&s));
                    if in_scope {
                        rejected.push(RejectedTicket {
                            ticket_id,
                            error: e,
                        });
                    }
                }
            }
        }

        Ok(TicketScan {
            tickets: query.select(&tickets),
            rejected,
        })
    }
}

/// Decode a stored ticket document, logging at error level on failure.
fn decode_ticket(ticket_id: &str, bytes: &[u8]) -> StoreResult<Ticket> {
    let err = match serde_json::from_slice::<Ticket>(bytes) {
        Ok(ticket) => return Ok(ticket),
        Err(e) => e,
    };

    let raw: Option<serde_json::Value> = serde_json::from_slice(bytes).ok();
    if let Some(priority) = raw
        .as_ref()
        .and_then(|doc| doc.get("priority"))
        .and_then(|p| p.as_str())
    {
        if target_minutes_for(priority).is_err() {
            error!(ticket_id, priority, "Stored ticket has a priority outside the SLA policy");
            return Err(StoreError::InvalidPriority {
                ticket_id: ticket_id.to_string(),
                value: priority.to_string(),
            });
        }
    }

    error!(ticket_id, error = %err, "Undecodable ticket record");
    Err(StoreError::Deserialization(format!("{}: {}", ticket_id, err)))
}

fn raw_status(bytes: &[u8]) -> Option<TicketStatus> {
    let doc: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    serde_json::from_value(doc.get("status")?.clone()).ok()
}

fn key_nanos(ts: chrono::DateTime<chrono::Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(0).max(0)
}

#[async_trait]
impl TicketStore for RocksTicketStore {
    async fn get(&self, ticket_id: &str) -> StoreResult<Option<Ticket>> {
        self.fetch_ticket(ticket_id)
    }

    async fn set(&self, ticket: &Ticket) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.put(
            schema::CF_TICKETS,
            &schema::keys::ticket(&ticket.ticket_id),
            ticket,
        )
    }

    async fn update_fields(&self, ticket_id: &str, patch: &TicketPatch) -> StoreResult<Ticket> {
        let _guard = self.write_lock.lock().await;
        let mut ticket = self
            .fetch_ticket(ticket_id)?
            .ok_or_else(|| StoreError::NotFound(ticket_id.to_string()))?;
        patch.check(&ticket)?;
        patch.apply(&mut ticket);
        self.put(schema::CF_TICKETS, &schema::keys::ticket(ticket_id), &ticket)?;
        Ok(ticket)
    }

    async fn query(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>> {
        Ok(self.scan_tickets(query)?.tickets)
    }

    async fn scan(&self, query: &TicketQuery) -> StoreResult<TicketScan> {
        self.scan_tickets(query)
    }

    async fn add_resolution(&self, ticket_id: &str, resolution: &Resolution) -> StoreResult<()> {
        let key = schema::keys::resolution(
            ticket_id,
            key_nanos(resolution.resolved_at),
            &resolution.resolution_id,
        );
        self.put(schema::CF_RESOLUTIONS, &key, resolution)
    }

    async fn resolutions(&self, ticket_id: &str) -> StoreResult<Vec<Resolution>> {
        self.scan_prefix(
            schema::CF_RESOLUTIONS,
            &schema::keys::resolution_prefix(ticket_id),
        )
    }

    async fn add_comment(&self, ticket_id: &str, comment: &Comment) -> StoreResult<()> {
        let key =
            schema::keys::comment(ticket_id, key_nanos(comment.created_at), &comment.comment_id);
        self.put(schema::CF_COMMENTS, &key, comment)
    }

    async fn comments(&self, ticket_id: &str) -> StoreResult<Vec<Comment>> {
        self.scan_prefix(schema::CF_COMMENTS, &schema::keys::comment_prefix(ticket_id))
    }
}
