//! Model-backed classifier: asks an LLM first, falls back to the rules.
//!
//! Flow:
//! 1. Build a tight prompt describing the closed sets and the message
//! 2. Parse the reply as a JSON object (markdown fences and prose tolerated)
//! 3. Accept it only if intent, priority and sentiment are known labels
//!
//! Any provider error or unusable reply returns the rule-based result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::LlmError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::engine::{Classifier, RuleBasedClassifier};
use crate::pipeline::types::{Classification, Intent, Message, Priority, Sentiment};

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 1024;

/// Low temperature keeps labels stable between calls.
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Body characters sent to the model.
const CONTENT_PREVIEW_CHARS: usize = 2000;

/// Key points kept from model output.
const MAX_MODEL_KEY_POINTS: usize = 5;

/// Classifier that consults an LLM and uses the rule engine as fallback.
pub struct ModelBackedClassifier {
    llm: Arc<dyn LlmProvider>,
    rules: RuleBasedClassifier,
    name: String,
}

impl ModelBackedClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, rules: RuleBasedClassifier) -> Self {
        let name = format!("model:{}", llm.model_name());
        Self { llm, rules, name }
    }

    /// Ask the model. `Err` means "use the rules instead".
    async fn classify_with_model(&self, message: &Message) -> Result<Classification, String> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(message)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e: LlmError| format!("LLM call failed: {e}"))?;

        let cost = response.cost(self.llm.cost_per_token());
        info!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost = %cost,
            "Model classification call complete"
        );

        let parsed = parse_model_response(&response.content).map_err(|e| {
            warn!(raw_response = %response.content, error = %e, "Unusable model reply");
            e
        })?;

        Ok(self.complete_classification(message, parsed))
    }

    /// Fill gaps from the composer and enforce escalation.
    fn complete_classification(&self, message: &Message, parsed: ModelLabels) -> Classification {
        let (key_points, suggested_response) =
            if parsed.key_points.is_empty() || parsed.suggested_response.is_none() {
                self.rules.compose(message, parsed.intent, parsed.priority)
            } else {
                (Vec::new(), String::new())
            };

        let key_points = if parsed.key_points.is_empty() {
            key_points
        } else {
            parsed.key_points
        };
        let suggested_response = parsed.suggested_response.unwrap_or(suggested_response);

        let requires_human = parsed.requires_human
            || parsed.priority.is_elevated()
            || parsed.intent == Intent::Complaint;
        if requires_human && !parsed.requires_human {
            debug!(
                intent = %parsed.intent,
                priority = %parsed.priority,
                "Model reply under-escalated, requiring human"
            );
        }

        Classification {
            intent: parsed.intent,
            priority: parsed.priority,
            sentiment: parsed.sentiment,
            requires_human,
            key_points,
            suggested_response,
        }
    }
}

#[async_trait]
impl Classifier for ModelBackedClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, message: &Message) -> Classification {
        match self.classify_with_model(message).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(error = %e, "Falling back to rule-based classification");
                self.rules.classify(message)
            }
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> String {
    format!(
        "You are an email triage engine for a customer-facing team. Classify each message.\n\n\
         Respond with ONLY a JSON object:\n\
         {{\"intent\": \"...\", \"priority\": \"...\", \"sentiment\": \"...\", \
         \"requires_human\": true, \"key_points\": [\"...\"], \"suggested_response\": \"...\"}}\n\n\
         Allowed values:\n\
         - intent: {}\n\
         - priority: {}\n\
         - sentiment: {}\n\n\
         Rules:\n\
         - Threats of legal action, outages and lost revenue are urgent complaints\n\
         - Large deployments, RFPs and enterprise budgets are sales opportunities, even when phrased as technical questions\n\
         - requires_human is true for complaints and for high or urgent priority\n\
         - key_points: at most {} short sentences quoted from the message\n\
         - suggested_response: a polite reply addressed to the sender by name",
        join_labels(Intent::ALL.iter().map(Intent::label)),
        join_labels(Priority::ALL.iter().map(Priority::label)),
        join_labels(Sentiment::ALL.iter().map(Sentiment::label)),
        MAX_MODEL_KEY_POINTS,
    )
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels.collect::<Vec<_>>().join(", ")
}

fn build_user_prompt(message: &Message) -> String {
    let content_preview: String = message.content.chars().take(CONTENT_PREVIEW_CHARS).collect();
    format!(
        "From: {}\nSubject: {}\n\nMessage:\n{}",
        message.sender, message.subject, content_preview
    )
}

// ── Response parsing ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ModelResponse {
    intent: String,
    priority: String,
    sentiment: String,
    #[serde(default)]
    requires_human: bool,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    suggested_response: Option<String>,
}

/// Validated labels from a model reply.
#[derive(Debug)]
struct ModelLabels {
    intent: Intent,
    priority: Priority,
    sentiment: Sentiment,
    requires_human: bool,
    key_points: Vec<String>,
    suggested_response: Option<String>,
}

fn parse_model_response(raw: &str) -> Result<ModelLabels, String> {
    let json_str = extract_json_object(raw);
    let response: ModelResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let intent = Intent::from_label(&response.intent)
        .ok_or_else(|| format!("unknown intent: '{}'", response.intent))?;
    let priority = Priority::from_label(&response.priority)
        .ok_or_else(|| format!("unknown priority: '{}'", response.priority))?;
    let sentiment = Sentiment::from_label(&response.sentiment)
        .ok_or_else(|| format!("unknown sentiment: '{}'", response.sentiment))?;

    let key_points = response
        .key_points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .take(MAX_MODEL_KEY_POINTS)
        .collect();

    Ok(ModelLabels {
        intent,
        priority,
        sentiment,
        requires_human: response.requires_human,
        key_points,
        suggested_response: response
            .suggested_response
            .filter(|r| !r.trim().is_empty()),
    })
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('{') {
                    return inner.to_string();
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::llm::provider::{CompletionResponse, FinishReason};
    use crate::pipeline::compose::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    // ── Parsing ─────────────────────────────────────────────────────

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"intent": "complaint"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown_block() {
        let input = "```json\n{\"intent\": \"complaint\"}\n```";
        assert_eq!(extract_json_object(input), "{\"intent\": \"complaint\"}");
    }

    #[test]
    fn extract_json_from_bare_fence() {
        let input = "Here you go:\n```\n{\"intent\": \"complaint\"}\n```";
        assert_eq!(extract_json_object(input), "{\"intent\": \"complaint\"}");
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "My analysis: {\"intent\": \"complaint\", \"priority\": \"high\"} done.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn parse_accepts_spaced_intent_labels() {
        let raw = r#"{"intent": "Sales Opportunity", "priority": "HIGH", "sentiment": "neutral"}"#;
        let labels = parse_model_response(raw).unwrap();
        assert_eq!(labels.intent, Intent::SalesOpportunity);
        assert_eq!(labels.priority, Priority::High);
        assert!(labels.key_points.is_empty());
        assert!(labels.suggested_response.is_none());
    }

    #[test]
    fn parse_rejects_unknown_labels() {
        let raw = r#"{"intent": "feature_request", "priority": "high", "sentiment": "neutral"}"#;
        assert!(parse_model_response(raw).unwrap_err().contains("unknown intent"));

        let raw = r#"{"intent": "complaint", "priority": "p0", "sentiment": "neutral"}"#;
        assert!(parse_model_response(raw).unwrap_err().contains("unknown priority"));

        let raw = r#"{"intent": "complaint", "priority": "high", "sentiment": "angry"}"#;
        assert!(parse_model_response(raw).unwrap_err().contains("unknown sentiment"));
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(parse_model_response(r#"{"intent": "complaint"}"#).is_err());
        assert!(parse_model_response("not json at all").is_err());
    }

    #[test]
    fn parse_caps_key_points() {
        let raw = r#"{"intent": "general_inquiry", "priority": "low", "sentiment": "neutral",
                      "key_points": ["a", "b", " ", "c", "d", "e", "f", "g"]}"#;
        let labels = parse_model_response(raw).unwrap();
        assert_eq!(labels.key_points, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn system_prompt_lists_closed_sets() {
        let prompt = build_system_prompt();
        for intent in Intent::ALL {
            assert!(prompt.contains(intent.label()));
        }
        assert!(prompt.contains("low, normal, high, urgent"));
        assert!(prompt.contains("negative, neutral, positive"));
    }

    #[test]
    fn user_prompt_truncates_content() {
        let message = Message::new("a@b.com", "Hi", "x".repeat(5000));
        let prompt = build_user_prompt(&message);
        assert!(prompt.contains("Subject: Hi"));
        assert_eq!(prompt.matches('x').count(), CONTENT_PREVIEW_CHARS);
    }

    // ── Integration: classifier with mock LLM ───────────────────────

    /// Mock LLM that returns a fixed reply, or fails.
    struct MockLlm {
        response: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-classifier"
        }

        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (dec!(0.000001), dec!(0.000002))
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match &self.response {
                Some(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 100,
                    output_tokens: 50,
                    finish_reason: FinishReason::Stop,
                    response_id: None,
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    fn classifier(response: Option<&str>) -> ModelBackedClassifier {
        let rules = RuleBasedClassifier::new(RuleConfig::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap(),
            )));
        ModelBackedClassifier::new(
            Arc::new(MockLlm {
                response: response.map(str::to_string),
            }),
            rules,
        )
    }

    fn pricing_message() -> Message {
        Message::new(
            "info@smallbiz.com",
            "Pricing information",
            "Hi, what are your pricing plans? We're a team of 10 people.",
        )
    }

    #[tokio::test]
    async fn model_output_overrides_rules() {
        let c = classifier(Some(
            r#"```json
            {"intent": "sales_opportunity", "priority": "low", "sentiment": "positive",
             "requires_human": false, "key_points": ["Team of 10"],
             "suggested_response": "Hello from the model"}
            ```"#,
        ));
        assert_eq!(c.name(), "model:mock-classifier");

        let result = c.classify(&pricing_message()).await;
        assert_eq!(result.intent, Intent::SalesOpportunity);
        assert_eq!(result.priority, Priority::Low);
        assert_eq!(result.sentiment, Sentiment::Positive);
        assert!(!result.requires_human);
        assert_eq!(result.key_points, ["Team of 10"]);
        assert_eq!(result.suggested_response, "Hello from the model");
    }

    #[tokio::test]
    async fn missing_reply_fields_are_composed() {
        let c = classifier(Some(
            r#"{"intent": "pricing_inquiry", "priority": "normal", "sentiment": "neutral"}"#,
        ));
        let result = c.classify(&pricing_message()).await;
        assert_eq!(result.key_points, ["Hi, what are your pricing plans"]);
        assert!(result.suggested_response.starts_with("Dear Info,"));
        assert!(result.suggested_response.contains("Starter"));
    }

    #[tokio::test]
    async fn escalation_is_enforced_on_model_output() {
        let c = classifier(Some(
            r#"{"intent": "complaint", "priority": "normal", "sentiment": "negative", "requires_human": false}"#,
        ));
        assert!(c.classify(&pricing_message()).await.requires_human);

        let c = classifier(Some(
            r#"{"intent": "support_request", "priority": "urgent", "sentiment": "neutral"}"#,
        ));
        assert!(c.classify(&pricing_message()).await.requires_human);
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_rules() {
        let message = pricing_message();
        let expected = classifier(None).rules.classify(&message);
        let result = classifier(None).classify(&message).await;
        assert_eq!(result, expected);
        assert_eq!(result.intent, Intent::PricingInquiry);
    }

    #[tokio::test]
    async fn unusable_reply_falls_back_to_rules() {
        for reply in [
            "I think this is a pricing question.",
            r#"{"intent": "refund", "priority": "high", "sentiment": "neutral"}"#,
        ] {
            let result = classifier(Some(reply)).classify(&pricing_message()).await;
            assert_eq!(result.intent, Intent::PricingInquiry, "{reply}");
            assert!(!result.requires_human);
        }
    }
}
