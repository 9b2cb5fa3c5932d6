//! Classification engine: remote NLP call with a deterministic rule fallback.
//!
//! ```text
//! classify(title, description)
//!   ├─ remote answers within the timeout → method = "ai"
//!   └─ timeout / transport / non-2xx / malformed → RuleClassifier
//!                                                  method = "rule-based-fallback"
//! ```
//!
//! The engine never returns an error. A caller only notices degradation by
//! the `method` tag and the lower fixed confidence of the rule result.

pub mod remote;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ticket::{Category, ClassificationRecord, Priority};

pub use remote::{
    ClassifyError, HttpClassifier, Recommendations, RemoteClassification, RemoteClassifier,
    ResolvedCandidate, SimilarTicket, DEFAULT_TIMEOUT,
};
pub use rules::RuleClassifier;

/// Provenance of a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationMethod {
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "rule-based-fallback")]
    RuleBasedFallback,
}

impl std::fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::RuleBasedFallback => write!(f, "rule-based-fallback"),
        }
    }
}

/// Per-request classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub priority: Priority,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub method: ClassificationMethod,
}

impl ClassificationResult {
    /// Wrap a remote answer verbatim.
    pub fn from_remote(remote: RemoteClassification) -> Self {
        Self {
            category: remote.category,
            priority: remote.priority,
            confidence: remote.confidence,
            keywords: remote.keywords,
            reasoning: remote.reasoning,
            method: ClassificationMethod::Ai,
        }
    }

    /// The immutable sub-record persisted on the ticket.
    pub fn to_record(&self, classified_at: DateTime<Utc>) -> ClassificationRecord {
        ClassificationRecord {
            predicted_category: self.category,
            predicted_priority: self.priority,
            confidence_score: self.confidence,
            keywords: self.keywords.clone(),
            reasoning: self.reasoning.clone(),
            classified_at,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.method == ClassificationMethod::RuleBasedFallback
    }
}

/// Remote-first classifier with rule fallback.
pub struct ClassificationEngine {
    remote: Option<Arc<dyn RemoteClassifier>>,
    timeout: Duration,
    rules: RuleClassifier,
}

impl ClassificationEngine {
    /// Engine backed by a remote classifier, bounded by [`DEFAULT_TIMEOUT`].
    pub fn new(remote: Arc<dyn RemoteClassifier>) -> Self {
        Self {
            remote: Some(remote),
            timeout: DEFAULT_TIMEOUT,
            rules: RuleClassifier::new(),
        }
    }

    /// Engine that never leaves the process.
    pub fn rules_only() -> Self {
        Self {
            remote: None,
            timeout: DEFAULT_TIMEOUT,
            rules: RuleClassifier::new(),
        }
    }

    /// HTTP-backed engine for the NLP service at `base_url`.
    pub fn http(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifyError> {
        let remote = HttpClassifier::new(base_url, timeout)?;
        Ok(Self::new(Arc::new(remote)).with_timeout(timeout))
    }

    /// Override the hard bound on the remote call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Classify a ticket. Never fails.
    pub async fn classify(&self, title: &str, description: &str) -> ClassificationResult {
        let Some(remote) = &self.remote else {
            return self.rules.classify(title, description);
        };

        match self.try_remote(remote.as_ref(), title, description).await {
            Ok(answer) => {
                let result = ClassificationResult::from_remote(answer);
                info!(
                    category = %result.category,
                    priority = %result.priority,
                    confidence = result.confidence,
                    "AI classification successful"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "NLP service unavailable, using fallback classifier");
                let result = self.rules.classify(title, description);
                info!(
                    category = %result.category,
                    priority = %result.priority,
                    confidence = result.confidence,
                    method = %result.method,
                    "Fallback classification applied"
                );
                result
            }
        }
    }

    /// Similar resolved tickets from the remote service. Never fails: no
    /// remote, no candidates, or any remote error yields an empty answer.
    pub async fn find_similar(
        &self,
        description: &str,
        candidates: &[ResolvedCandidate],
    ) -> Recommendations {
        let Some(remote) = &self.remote else {
            return Recommendations::empty();
        };
        if candidates.is_empty() {
            return Recommendations::empty();
        }

        let answer = match tokio::time::timeout(
            self.timeout,
            remote.find_similar(description, candidates),
        )
        .await
        {
            Ok(answer) => answer,
            Err(_) => Err(ClassifyError::Timeout(self.timeout)),
        };

        match answer {
            Ok(recommendations) => {
                debug!(
                    candidates = candidates.len(),
                    matches = recommendations.similar_tickets.len(),
                    "Similarity search complete"
                );
                recommendations
            }
            Err(e) => {
                warn!(error = %e, "Similarity search unavailable, returning no recommendations");
                Recommendations::empty()
            }
        }
    }

    /// Remote call under a hard deadline, independent of whatever timeout the
    /// remote implementation enforces itself.
    async fn try_remote(
        &self,
        remote: &dyn RemoteClassifier,
        title: &str,
        description: &str,
    ) -> Result<RemoteClassification, ClassifyError> {
        match tokio::time::timeout(self.timeout, remote.classify(title, description)).await {
            Ok(answer) => answer?.validate(),
            Err(_) => Err(ClassifyError::Timeout(self.timeout)),
        }
    }
}

impl Default for ClassificationEngine {
    fn default() -> Self {
        Self::rules_only()
    }
}
