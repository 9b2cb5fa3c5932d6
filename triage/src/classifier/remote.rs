//! Remote (NLP service) classifier.
//!
//! Wire contract: `POST {base_url}/api/nlp/classify` with
//! `{"title": .., "description": ..}`, answered by
//! `{"category", "priority", "confidence", "keywords"?, "reasoning"?}`.
//! Anything else (transport error, timeout, non-2xx, an unknown category or
//! priority, a confidence outside 0.0–1.0) is a [`ClassifyError`].
//!
//! The same service answers `POST {base_url}/api/nlp/find-similar` with
//! `{"description", "resolvedTickets": [..]}` and returns
//! `{"similarTickets": [..], "topMatch"?}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::{Category, Priority};

/// Default bound on a single remote classification.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Why the remote classifier could not be used. Never leaves the crate's
/// classification engine; it is logged and replaced by the rule result.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification timed out after {0:?}")]
    Timeout(Duration),

    #[error("classification request failed: {0}")]
    Request(String),

    #[error("classification service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed classification response: {0}")]
    Malformed(String),
}

/// Successful remote answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteClassification {
    pub category: Category,
    pub priority: Priority,
    pub confidence: f64,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl RemoteClassification {
    /// Reject answers that parse but are out of contract.
    pub fn validate(self) -> Result<Self, ClassifyError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ClassifyError::Malformed(format!(
                "confidence {} outside 0.0..=1.0",
                self.confidence
            )));
        }
        Ok(self)
    }
}

/// Resolved ticket offered to the similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCandidate {
    pub ticket_id: String,
    pub title: String,
    pub description: String,
    /// Text of the ticket's first resolution.
    pub resolution: String,
    pub category: Category,
}

/// One match from the similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarTicket {
    pub ticket_id: String,
    pub title: String,
    pub similarity_score: f64,
    pub resolution: String,
    pub category: Category,
}

/// Similar resolved tickets, best match first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub similar_tickets: Vec<SimilarTicket>,
    #[serde(default)]
    pub top_match: Option<SimilarTicket>,
}

impl Recommendations {
    /// What callers get when the similarity search is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.similar_tickets.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimilarityRequest<'a> {
    description: &'a str,
    resolved_tickets: &'a [ResolvedCandidate],
}

/// Seam for the remote NLP calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<RemoteClassification, ClassifyError>;

    /// Rank `candidates` by similarity to `description`.
    async fn find_similar(
        &self,
        description: &str,
        candidates: &[ResolvedCandidate],
    ) -> Result<Recommendations, ClassifyError>;
}

/// HTTP client for the NLP classification service.
pub struct HttpClassifier {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Build a client with a hard per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            timeout,
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        self.url("/api/nlp/classify")
    }

    pub fn similarity_endpoint(&self) -> String {
        self.url("/api/nlp/find-similar")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout(self.timeout)
        } else {
            ClassifyError::Request(e.to_string())
        }
    }

    /// POST `body` as JSON and decode a 2xx JSON answer.
    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<R, ClassifyError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Status { status, body });
        }

        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&text).map_err(|e| ClassifyError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteClassifier for HttpClassifier {
    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<RemoteClassification, ClassifyError> {
        let request_body = serde_json::json!({
            "title": title,
            "description": description,
        });

        let parsed: RemoteClassification = self.post_json(self.endpoint(), &request_body).await?;
        parsed.validate()
    }

    async fn find_similar(
        &self,
        description: &str,
        candidates: &[ResolvedCandidate],
    ) -> Result<Recommendations, ClassifyError> {
        let request = SimilarityRequest {
            description,
            resolved_tickets: candidates,
        };
        self.post_json(self.similarity_endpoint(), &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let c = HttpClassifier::new("http://nlp:8000/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(c.endpoint(), "http://nlp:8000/api/nlp/classify");
    }

    #[test]
    fn test_similarity_wire_format() {
        let candidates = vec![ResolvedCandidate {
            ticket_id: "t-9".to_string(),
            title: "Refund stuck".to_string(),
            description: "refund pending for a week".to_string(),
            resolution: "Re-ran the payout job".to_string(),
            category: Category::Payment,
        }];
        let body = serde_json::to_value(SimilarityRequest {
            description: "refund not received",
            resolved_tickets: &candidates,
        })
        .unwrap();
        assert_eq!(body["resolvedTickets"][0]["ticketId"], "t-9");
        assert_eq!(body["resolvedTickets"][0]["category"], "payment");

        let parsed: Recommendations = serde_json::from_str(
            r#"{"similarTickets":[{"ticketId":"t-9","title":"Refund stuck",
                "similarityScore":0.812,"resolution":"Re-ran the payout job",
                "category":"payment"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.similar_tickets[0].similarity_score, 0.812);
        assert!(parsed.top_match.is_none());
    }

    #[test]
    fn test_response_with_optional_fields() {
        let parsed: RemoteClassification = serde_json::from_str(
            r#"{"category":"api","priority":"high","confidence":0.91,
                "keywords":["webhook","timeout"],"reasoning":"webhook failures"}"#,
        )
        .unwrap();
        assert_eq!(parsed.category, Category::Api);
        assert_eq!(parsed.keywords.as_deref().map(|k| k.len()), Some(2));
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_unknown_category_does_not_parse() {
        let parsed = serde_json::from_str::<RemoteClassification>(
            r#"{"category":"billing","priority":"high","confidence":0.9}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_confidence_out_of_range_is_malformed() {
        let parsed = RemoteClassification {
            category: Category::Bug,
            priority: Priority::Low,
            confidence: 1.4,
            keywords: None,
            reasoning: None,
        };
        assert!(matches!(parsed.validate(), Err(ClassifyError::Malformed(_))));
    }
}
