//! Deterministic keyword classifier used when the remote classifier is down.
//!
//! Categories are tested in a fixed order and the first match wins, so a
//! ticket mentioning both a card payment and a login is filed under payment.
//! Each category carries its own urgency expression that lifts the priority
//! above the category default. Confidence is a fixed per-category value.

use std::sync::LazyLock;

use regex::Regex;

use crate::classifier::{ClassificationMethod, ClassificationResult};
use crate::ticket::{Category, Priority};

/// Returned when no category expression matches.
const DEFAULT_CATEGORY: Category = Category::Bug;
const DEFAULT_PRIORITY: Priority = Priority::Medium;
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// One entry of the ordered rule table.
struct CategoryRule {
    category: Category,
    matcher: Regex,
    /// Urgency expression and the priority it selects.
    urgency: Option<(Regex, Priority)>,
    base_priority: Priority,
    confidence: f64,
}

impl CategoryRule {
    fn new(
        category: Category,
        pattern: &str,
        urgency: Option<(&str, Priority)>,
        base_priority: Priority,
        confidence: f64,
    ) -> Self {
        let compile = |p: &str| {
            Regex::new(&format!("(?i){p}")).expect("rule classifier regex should compile")
        };
        Self {
            category,
            matcher: compile(pattern),
            urgency: urgency.map(|(p, priority)| (compile(p), priority)),
            base_priority,
            confidence,
        }
    }

    fn priority_for(&self, text: &str) -> Priority {
        match &self.urgency {
            Some((re, priority)) if re.is_match(text) => *priority,
            _ => self.base_priority,
        }
    }
}

/// Ordered rule table. Order matters: payment, authentication, api,
/// performance, bug, feature.
static RULES: LazyLock<Vec<CategoryRule>> = LazyLock::new(|| {
    vec![
        CategoryRule::new(
            Category::Payment,
            r"payment|billing|charge|refund|invoice|transaction|card",
            Some((r"urgent|asap|immediately", Priority::High)),
            Priority::Medium,
            0.7,
        ),
        CategoryRule::new(
            Category::Authentication,
            r"login|sign in|password|auth|access|account|2fa|reset",
            Some((r"locked|can't login|cannot access", Priority::High)),
            Priority::Medium,
            0.7,
        ),
        CategoryRule::new(
            Category::Api,
            r"api|endpoint|request|response|integration|webhook",
            Some((r"down|not working|failing|error 500", Priority::Critical)),
            Priority::Medium,
            0.7,
        ),
        CategoryRule::new(
            Category::Performance,
            r"slow|performance|lag|timeout|loading|speed",
            Some((r"completely|not loading|down", Priority::High)),
            Priority::Medium,
            0.6,
        ),
        CategoryRule::new(
            Category::Bug,
            r"bug|error|crash|broken|not working|issue|problem",
            Some((r"critical|urgent|production|data loss", Priority::Critical)),
            Priority::Medium,
            0.6,
        ),
        CategoryRule::new(
            Category::Feature,
            r"feature|enhancement|suggestion|would like|could you add|want",
            None,
            Priority::Low,
            0.6,
        ),
    ]
});

/// Keyword rule classifier. Pure; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, title: &str, description: &str) -> ClassificationResult {
        let text = format!("{} {}", title, description).to_lowercase();

        let (category, priority, confidence) = RULES
            .iter()
            .find(|rule| rule.matcher.is_match(&text))
            .map(|rule| (rule.category, rule.priority_for(&text), rule.confidence))
            .unwrap_or((DEFAULT_CATEGORY, DEFAULT_PRIORITY, DEFAULT_CONFIDENCE));

        ClassificationResult {
            category,
            priority,
            confidence,
            keywords: None,
            reasoning: None,
            method: ClassificationMethod::RuleBasedFallback,
        }
    }
}
