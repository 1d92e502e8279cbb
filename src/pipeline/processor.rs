//! Message processor: validates inbound messages and runs a classifier.
//!
//! Flow:
//! 1. Validate raw JSON into a `Message` (malformed input is rejected)
//! 2. Classify with whichever `Classifier` was configured
//! 3. Record the result in batch statistics
//!
//! Per-message failures in a batch are logged and counted, never fatal.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::InputError;
use crate::pipeline::engine::Classifier;
use crate::pipeline::types::{
    Classification, Intent, Message, Priority, ProcessedMessage, Sentiment,
};

/// Counts over a set of classifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TriageStats {
    pub total: usize,
    pub by_intent: BTreeMap<Intent, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_sentiment: BTreeMap<Sentiment, usize>,
    pub requires_human: usize,
}

impl TriageStats {
    pub fn record(&mut self, classification: &Classification) {
        self.total += 1;
        *self.by_intent.entry(classification.intent).or_default() += 1;
        *self.by_priority.entry(classification.priority).or_default() += 1;
        *self.by_sentiment.entry(classification.sentiment).or_default() += 1;
        if classification.requires_human {
            self.requires_human += 1;
        }
    }

    pub fn intent(&self, intent: Intent) -> usize {
        self.by_intent.get(&intent).copied().unwrap_or(0)
    }

    pub fn priority(&self, priority: Priority) -> usize {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }

    pub fn sentiment(&self, sentiment: Sentiment) -> usize {
        self.by_sentiment.get(&sentiment).copied().unwrap_or(0)
    }
}

/// A batch item that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedMessage {
    /// Position in the submitted batch.
    pub index: usize,
    pub error: String,
}

/// Outcome of `MessageProcessor::process_batch`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<ProcessedMessage>,
    pub rejected: Vec<RejectedMessage>,
    pub stats: TriageStats,
}

/// Runs inbound messages through a classifier.
pub struct MessageProcessor {
    classifier: Arc<dyn Classifier>,
}

impl MessageProcessor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    /// Classify one already-validated message.
    pub async fn process(&self, message: Message) -> ProcessedMessage {
        info!(
            sender = %message.sender,
            subject = %message.subject,
            classifier = self.classifier.name(),
            "Processing inbound message"
        );

        let classification = self.classifier.classify(&message).await;

        debug!(
            intent = %classification.intent,
            priority = %classification.priority,
            requires_human = classification.requires_human,
            "Message processed"
        );

        ProcessedMessage {
            message,
            classification,
            classifier: self.classifier.name().to_string(),
            processed_at: Utc::now(),
        }
    }

    /// Validate an untyped JSON message, then classify it.
    pub async fn process_value(
        &self,
        value: &serde_json::Value,
    ) -> Result<ProcessedMessage, InputError> {
        let message = Message::from_value(value)?;
        Ok(self.process(message).await)
    }

    /// Process a batch of raw messages.
    ///
    /// Processes each message independently. Invalid items are logged and
    /// reported but don't fail the entire batch.
    pub async fn process_batch(&self, values: Vec<serde_json::Value>) -> BatchReport {
        let count = values.len();
        info!(count, "Processing message batch");

        let mut report = BatchReport::default();
        for (index, value) in values.iter().enumerate() {
            match self.process_value(value).await {
                Ok(processed) => {
                    report.stats.record(&processed.classification);
                    report.processed.push(processed);
                }
                Err(e) => {
                    error!(index, error = %e, "Rejected message in batch");
                    report.rejected.push(RejectedMessage {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = report.processed.len(),
            rejected = report.rejected.len(),
            total = count,
            requires_human = report.stats.requires_human,
            "Batch processing complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::engine::RuleBasedClassifier;
    use async_trait::async_trait;
    use serde_json::json;

    fn processor() -> MessageProcessor {
        MessageProcessor::new(Arc::new(RuleBasedClassifier::default()))
    }

    fn classification(intent: Intent, priority: Priority, requires_human: bool) -> Classification {
        Classification {
            intent,
            priority,
            sentiment: Sentiment::Neutral,
            requires_human,
            key_points: vec![],
            suggested_response: String::new(),
        }
    }

    #[test]
    fn stats_record_counts() {
        let mut stats = TriageStats::default();
        stats.record(&classification(Intent::Complaint, Priority::Urgent, true));
        stats.record(&classification(Intent::Complaint, Priority::High, true));
        stats.record(&classification(Intent::GeneralInquiry, Priority::Normal, false));

        assert_eq!(stats.total, 3);
        assert_eq!(stats.intent(Intent::Complaint), 2);
        assert_eq!(stats.intent(Intent::PricingInquiry), 0);
        assert_eq!(stats.priority(Priority::Urgent), 1);
        assert_eq!(stats.sentiment(Sentiment::Neutral), 3);
        assert_eq!(stats.requires_human, 2);
    }

    #[test]
    fn stats_serialize_with_labels() {
        let mut stats = TriageStats::default();
        stats.record(&classification(Intent::SalesOpportunity, Priority::High, true));
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["by_intent"]["sales_opportunity"], 1);
        assert_eq!(value["by_priority"]["high"], 1);
    }

    #[tokio::test]
    async fn process_records_classifier_name() {
        let processed = processor()
            .process(Message::new("a@b.com", "Pricing", "What does the pro plan cost?"))
            .await;
        assert_eq!(processed.classifier, "rules");
        assert_eq!(processed.classification.intent, Intent::PricingInquiry);
        assert_eq!(processed.message.subject, "Pricing");
    }

    #[tokio::test]
    async fn process_value_rejects_invalid_input() {
        let err = processor()
            .process_value(&json!({"sender": "a@b.com", "content": "no subject"}))
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::MissingField { ref field } if field == "subject"));
    }

    #[tokio::test]
    async fn batch_continues_past_invalid_items() {
        let report = processor()
            .process_batch(vec![
                json!({"sender": "a@b.com", "subject": "Pricing", "content": "Any discount?"}),
                json!("just a string"),
                json!({"subject": "Hi", "content": 7}),
                json!({"sender": "c@d.com", "subject": "Thanks", "content": "Great work, thank you."}),
            ])
            .await;

        assert_eq!(report.processed.len(), 2);
        assert_eq!(report.stats.total, 2);
        let rejected: Vec<_> = report.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, [1, 2]);
        assert!(report.rejected[0].error.contains("JSON object"));
    }

    #[tokio::test]
    async fn empty_batch_is_empty_report() {
        let report = processor().process_batch(vec![]).await;
        assert!(report.processed.is_empty());
        assert!(report.rejected.is_empty());
        assert_eq!(report.stats, TriageStats::default());
    }

    /// Classifier that always answers the same thing.
    struct FixedClassifier;

    #[async_trait]
    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn classify(&self, _message: &Message) -> Classification {
            classification(Intent::SupportRequest, Priority::High, true)
        }
    }

    #[tokio::test]
    async fn processor_uses_injected_classifier() {
        let processor = MessageProcessor::new(Arc::new(FixedClassifier));
        let report = processor
            .process_batch(vec![json!({"subject": "x", "content": "y"})])
            .await;
        assert_eq!(report.processed[0].classifier, "fixed");
        assert_eq!(report.stats.priority(Priority::High), 1);
    }
}
