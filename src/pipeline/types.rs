//! Shared types for the classification pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;

// ── Inbound message ─────────────────────────────────────────────────

/// An inbound message to classify.
///
/// Created per request and never mutated. Channel adapters (web endpoint,
/// queue consumer, inbox poller) convert their native format into this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender address, e.g. `jane.doe@example.com`.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub content: String,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            content: content.into(),
        }
    }

    /// Parse a message from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, InputError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| InputError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Validate an untyped JSON value into a message.
    ///
    /// `subject` and `content` are required strings. `sender` may be absent,
    /// but if present it must be a string too.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, InputError> {
        let object = value.as_object().ok_or(InputError::NotAnObject)?;

        let required = |field: &str| -> Result<String, InputError> {
            match object.get(field) {
                None | Some(serde_json::Value::Null) => Err(InputError::MissingField {
                    field: field.to_string(),
                }),
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(_) => Err(InputError::NotAString {
                    field: field.to_string(),
                }),
            }
        };

        let sender = match object.get("sender") {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(InputError::NotAString {
                    field: "sender".to_string(),
                });
            }
        };

        Ok(Self {
            sender,
            subject: required("subject")?,
            content: required("content")?,
        })
    }
}

impl TryFrom<&serde_json::Value> for Message {
    type Error = InputError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

// ── Closed sets ─────────────────────────────────────────────────────

/// What the sender wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Complaint,
    SalesOpportunity,
    SupportRequest,
    PricingInquiry,
    GeneralInquiry,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Complaint,
        Intent::SalesOpportunity,
        Intent::SupportRequest,
        Intent::PricingInquiry,
        Intent::GeneralInquiry,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Complaint => "complaint",
            Intent::SalesOpportunity => "sales_opportunity",
            Intent::SupportRequest => "support_request",
            Intent::PricingInquiry => "pricing_inquiry",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }

    /// Parse a label, accepting spaces or dashes in place of underscores.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|i| i.label() == normalized)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Handling priority. Totally ordered: `Low < Normal < High < Urgent`.
///
/// The rule engine never emits `Low`; it exists for model-backed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.label() == normalized)
    }

    /// High and urgent messages always go to a human.
    pub fn is_elevated(&self) -> bool {
        *self >= Priority::High
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|s| s.label() == normalized)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Signals ─────────────────────────────────────────────────────────

/// A keyword category counted by the signal extractor.
///
/// The first nine are evidence for classification. The rest are qualifiers
/// the cascade and the escalation check look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Crisis,
    Complaint,
    Sales,
    Support,
    Pricing,
    Urgent,
    HighValue,
    Positive,
    Negative,
    /// Deployment or evaluation scale ("deployment", "enterprise", ...).
    DeploymentScale,
    /// Enterprise or custom-plan wording next to a pricing question.
    EnterpriseCustom,
    /// Budget or headcount scale ("budget", "000", "employees", ...).
    BudgetScale,
    /// Something is broken or down.
    Outage,
    /// Legal threat.
    Legal,
}

impl Signal {
    pub const ALL: [Signal; 14] = [
        Signal::Crisis,
        Signal::Complaint,
        Signal::Sales,
        Signal::Support,
        Signal::Pricing,
        Signal::Urgent,
        Signal::HighValue,
        Signal::Positive,
        Signal::Negative,
        Signal::DeploymentScale,
        Signal::EnterpriseCustom,
        Signal::BudgetScale,
        Signal::Outage,
        Signal::Legal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Signal::Crisis => "crisis",
            Signal::Complaint => "complaint",
            Signal::Sales => "sales",
            Signal::Support => "support",
            Signal::Pricing => "pricing",
            Signal::Urgent => "urgent",
            Signal::HighValue => "high_value",
            Signal::Positive => "positive",
            Signal::Negative => "negative",
            Signal::DeploymentScale => "deployment_scale",
            Signal::EnterpriseCustom => "enterprise_custom",
            Signal::BudgetScale => "budget_scale",
            Signal::Outage => "outage",
            Signal::Legal => "legal",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Classification ──────────────────────────────────────────────────

/// The engine's sole output. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub priority: Priority,
    pub sentiment: Sentiment,
    pub requires_human: bool,
    pub key_points: Vec<String>,
    pub suggested_response: String,
}

/// A message after it has been through a classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    /// The original inbound message.
    pub message: Message,
    pub classification: Classification,
    /// Name of the classifier that produced the result.
    pub classifier: String,
    /// When processing completed.
    pub processed_at: DateTime<Utc>,
}
