//! Classification engine: the four stages wired together.
//!
//! `RuleBasedClassifier` is a pure function of the message and its
//! `RuleConfig`. The clock only feeds ticket ids inside the reply text and
//! the knowledge base only feeds the reply's context lines; neither can
//! change intent, priority, sentiment or escalation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::RuleConfig;
use crate::error::{ConfigError, InputError};
use crate::knowledge::{DEFAULT_LOOKUP_LIMIT, KnowledgeBase};
use crate::pipeline::compose::{self, Clock, SystemClock};
use crate::pipeline::types::{Classification, Intent, Message, Priority};
use crate::pipeline::{refine, rules, signals};

/// Anything that can turn a message into a classification.
///
/// Implementations never fail: a well-formed message always gets a usable
/// classification.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short identifier recorded alongside each result.
    fn name(&self) -> &str;

    async fn classify(&self, message: &Message) -> Classification;
}

/// Deterministic keyword and rule engine.
#[derive(Clone)]
pub struct RuleBasedClassifier {
    config: Arc<RuleConfig>,
    clock: Arc<dyn Clock>,
    knowledge: Option<Arc<KnowledgeBase>>,
}

impl std::fmt::Debug for RuleBasedClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedClassifier")
            .field("knowledge_entries", &self.knowledge.as_ref().map(|kb| kb.len()))
            .finish_non_exhaustive()
    }
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self {
            config: Arc::new(RuleConfig::default()),
            clock: Arc::new(SystemClock),
            knowledge: None,
        }
    }
}

impl RuleBasedClassifier {
    /// Build an engine over a normalized, validated configuration.
    pub fn new(mut config: RuleConfig) -> Result<Self, ConfigError> {
        config.normalize();
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            ..Self::default()
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = Some(Arc::new(knowledge));
        self
    }

    pub fn config(&self) -> &RuleConfig {
        &self.config
    }

    /// Run all four stages over one message.
    pub fn classify(&self, message: &Message) -> Classification {
        let counts = signals::extract(message, &self.config);
        let resolution = rules::resolve(&counts, &message.subject, &self.config);
        let refined = refine::refine(&resolution, &counts, &self.config.thresholds);
        let (key_points, suggested_response) =
            self.compose(message, resolution.intent, refined.priority);

        debug!(
            rule = resolution.rule,
            intent = %resolution.intent,
            priority = %refined.priority,
            sentiment = %refined.sentiment,
            requires_human = refined.requires_human,
            key_points = key_points.len(),
            "Message classified"
        );

        Classification {
            intent: resolution.intent,
            priority: refined.priority,
            sentiment: refined.sentiment,
            requires_human: refined.requires_human,
            key_points,
            suggested_response,
        }
    }

    /// Validate an untyped JSON message, then classify it.
    pub fn classify_value(&self, value: &serde_json::Value) -> Result<Classification, InputError> {
        let message = Message::from_value(value)?;
        Ok(self.classify(&message))
    }

    /// Key points and a reply for an already-decided intent and priority.
    pub fn compose(
        &self,
        message: &Message,
        intent: Intent,
        priority: Priority,
    ) -> (Vec<String>, String) {
        let key_points = compose::key_points(&message.content, &self.config.key_points);

        let context = match &self.knowledge {
            Some(kb) => kb.context_lines(
                &format!("{} {}", message.subject, message.content),
                DEFAULT_LOOKUP_LIMIT,
            ),
            None => Vec::new(),
        };

        let response = compose::compose_response(
            message,
            intent,
            priority,
            &self.config.templates,
            self.clock.now(),
            &context,
        );

        (key_points, response)
    }
}

#[async_trait]
impl Classifier for RuleBasedClassifier {
    fn name(&self) -> &str {
        "rules"
    }

    async fn classify(&self, message: &Message) -> Classification {
        RuleBasedClassifier::classify(self, message)
    }
}
