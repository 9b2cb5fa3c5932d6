//! In-process ticket store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{
    SharedTicketStore, StoreError, StoreResult, TicketPatch, TicketQuery, TicketStore,
};
use crate::ticket::{Comment, Resolution, Ticket};

#[derive(Default)]
struct Collections {
    tickets: HashMap<String, Ticket>,
    resolutions: HashMap<String, Vec<Resolution>>,
    comments: HashMap<String, Vec<Comment>>,
}

/// `HashMap`-backed store. Every operation takes one lock, so a patch is
/// applied atomically with respect to other writers.
#[derive(Default)]
pub struct MemoryTicketStore {
    inner: RwLock<Collections>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedTicketStore {
        Arc::new(self)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.tickets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn get(&self, ticket_id: &str) -> StoreResult<Option<Ticket>> {
        Ok(self.inner.read().await.tickets.get(ticket_id).cloned())
    }

    async fn set(&self, ticket: &Ticket) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .tickets
            .insert(ticket.ticket_id.clone(), ticket.clone());
        Ok(())
    }

    async fn update_fields(&self, ticket_id: &str, patch: &TicketPatch) -> StoreResult<Ticket> {
        let mut inner = self.inner.write().await;
        let ticket = inner
            .tickets
            .get_mut(ticket_id)
            .ok_or_else(|| StoreError::NotFound(ticket_id.to_string()))?;
        patch.check(ticket)?;
        patch.apply(ticket);
        Ok(ticket.clone())
    }

    async fn query(&self, query: &TicketQuery) -> StoreResult<Vec<Ticket>> {
        Ok(query.select(self.inner.read().await.tickets.values()))
    }

    async fn add_resolution(&self, ticket_id: &str, resolution: &Resolution) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .resolutions
            .entry(ticket_id.to_string())
            .or_default()
            .push(resolution.clone());
        Ok(())
    }

    async fn resolutions(&self, ticket_id: &str) -> StoreResult<Vec<Resolution>> {
        Ok(self
            .inner
            .read()
            .await
            .resolutions
            .get(ticket_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_comment(&self, ticket_id: &str, comment: &Comment) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .comments
            .entry(ticket_id.to_string())
            .or_default()
            .push(comment.clone());
        Ok(())
    }

    async fn comments(&self, ticket_id: &str) -> StoreResult<Vec<Comment>> {
        let mut comments = self
            .inner
            .read()
            .await
            .comments
            .get(ticket_id)
            .cloned()
            .unwrap_or_default();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::sample_ticket;
    use crate::ticket::{Priority, SlaStatus, TicketStatus};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_ticket_crud() {
        let store = MemoryTicketStore::new();
        assert!(store.is_empty().await);

        let ticket = sample_ticket("t-1", "cust-1", Utc::now());
        store.set(&ticket).await.unwrap();

        let loaded = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(loaded, ticket);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_fields_returns_patched_document() {
        let store = MemoryTicketStore::new();
        store
            .set(&sample_ticket("t-1", "cust-1", Utc::now()))
            .await
            .unwrap();

        let patch = TicketPatch {
            status: Some(TicketStatus::InProgress),
            priority: Some(Priority::Critical),
            sla_status: Some(SlaStatus::AtRisk),
            ..TicketPatch::default()
        };
        let updated = store.update_fields("t-1", &patch).await.unwrap();
        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(updated.priority, Priority::Critical);

        let reloaded = store.get("t-1").await.unwrap().unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn test_update_missing_ticket_is_not_found() {
        let store = MemoryTicketStore::new();
        let err = store
            .update_fields("nope", &TicketPatch::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_guarded_patch_leaves_resolved_ticket_alone() {
        let store = MemoryTicketStore::new();
        let mut resolved = sample_ticket("t-1", "cust-1", Utc::now());
        resolved.status = TicketStatus::Resolved;
        store.set(&resolved).await.unwrap();

        let patch = TicketPatch {
            priority: Some(Priority::Critical),
            sla_status: Some(SlaStatus::AtRisk),
            ..TicketPatch::default()
        }
        .only_if_active();
        let err = store.update_fields("t-1", &patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Inactive(ref id) if id == "t-1"));
        assert_eq!(store.get("t-1").await.unwrap().unwrap(), resolved);
    }

    #[tokio::test]
    async fn test_active_query_excludes_resolved() {
        let store = MemoryTicketStore::new();
        let t0 = Utc::now();
        for (i, status) in [
            TicketStatus::Open,
            TicketStatus::Resolved,
            TicketStatus::InProgress,
        ]
        .into_iter()
        .enumerate()
        {
            let mut t = sample_ticket(&format!("t-{i}"), "cust-1", t0 + Duration::minutes(i as i64));
            t.status = status;
            store.set(&t).await.unwrap();
        }

        let active = store.query(&TicketQuery::active()).await.unwrap();
        let ids: Vec<&str> = active.iter().map(|t| t.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["t-0", "t-2"]);
    }

    #[tokio::test]
    async fn test_side_collections() {
        let store = MemoryTicketStore::new();
        let now = Utc::now();

        let later = Comment {
            comment_id: "c-2".to_string(),
            user_id: "eng-1".to_string(),
            user_name: "Eng".to_string(),
            comment_text: "second".to_string(),
            created_at: now + Duration::minutes(5),
        };
        let earlier = Comment {
            comment_id: "c-1".to_string(),
            comment_text: "first".to_string(),
            created_at: now,
            ..later.clone()
        };
        store.add_comment("t-1", &later).await.unwrap();
        store.add_comment("t-1", &earlier).await.unwrap();

        let comments = store.comments("t-1").await.unwrap();
        assert_eq!(comments[0].comment_id, "c-1");
        assert_eq!(comments[1].comment_id, "c-2");
        assert!(store.comments("t-2").await.unwrap().is_empty());

        let resolution = Resolution {
            resolution_id: "r-1".to_string(),
            engineer_id: "eng-1".to_string(),
            resolution_text: "fixed".to_string(),
            resolved_at: now,
            resolution_time_minutes: 42,
        };
        store.add_resolution("t-1", &resolution).await.unwrap();
        assert_eq!(store.resolutions("t-1").await.unwrap(), vec![resolution]);
    }
}
