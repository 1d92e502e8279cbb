//! Rule configuration.
//!
//! A `RuleConfig` is built once at startup (defaults, a JSON file, or the
//! file named by `INBOX_TRIAGE_RULES`), validated, and then only read. The
//! engine receives it by value at construction time; there are no global
//! keyword tables.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::pipeline::types::{Intent, Priority, Signal};

/// Environment variable naming a JSON rule file.
pub const RULES_PATH_ENV: &str = "INBOX_TRIAGE_RULES";

/// Static classification rules: keyword lists, thresholds, key-point
/// settings and response templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Keyword list per signal category. Matching is case-insensitive
    /// substring containment.
    pub keywords: BTreeMap<Signal, Vec<String>>,
    pub thresholds: Thresholds,
    pub key_points: KeyPointConfig,
    pub templates: TemplateConfig,
}

/// Numeric cut-offs used by the resolver and the refiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Crisis hits that make a message an urgent complaint.
    pub crisis: usize,
    /// Complaint hits that make an urgent-subject message an urgent complaint.
    pub subject_complaint: usize,
    /// Complaint hits for a high-priority complaint.
    pub strong_complaint: usize,
    /// Sales hits needed alongside a deployment-scale qualifier.
    pub sales: usize,
    /// Pricing hits needed alongside an enterprise/custom qualifier.
    pub enterprise_pricing: usize,
    /// Sales hits needed alongside a budget/scale qualifier.
    pub sales_with_budget: usize,
    /// Support hits needed when the subject says urgent or broken.
    pub urgent_support: usize,
    /// Support hits for a plain support request.
    pub support: usize,
    /// Pricing hits for a pricing inquiry.
    pub pricing: usize,
    /// Literal subject marker checked by the crisis and urgent-support rules.
    pub subject_urgent_marker: String,
    /// Exclamation marks that count as an urgency token.
    pub urgent_exclamations: usize,
    /// ALL-CAPS words above which the tone is negative.
    pub negative_caps_words: usize,
    /// Exclamation marks above which the tone is negative.
    pub negative_exclamations: usize,
    /// Minimum length of a word counted as ALL-CAPS.
    pub caps_word_min_chars: usize,
    /// Quantities at or above this count as explicit large numbers. A
    /// quantity is comma-grouped, carries a k/m/million suffix, or is
    /// followed by a unit noun such as `users` or `seats`.
    pub large_number: Decimal,
    /// Dollar amounts at or above this are high-value tokens.
    pub high_value_amount: Decimal,
    /// Dollar amounts at or above this always go to a human.
    pub very_large_amount: Decimal,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            crisis: 2,
            subject_complaint: 1,
            strong_complaint: 2,
            sales: 2,
            enterprise_pricing: 1,
            sales_with_budget: 3,
            urgent_support: 1,
            support: 2,
            pricing: 1,
            subject_urgent_marker: "urgent".to_string(),
            urgent_exclamations: 3,
            negative_caps_words: 5,
            negative_exclamations: 10,
            caps_word_min_chars: 4,
            large_number: dec!(10000),
            high_value_amount: dec!(10000),
            very_large_amount: dec!(100000),
        }
    }
}

/// Key-point extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPointConfig {
    /// Words that make a sentence worth surfacing.
    pub importance: Vec<String>,
    /// Sentences shorter than this (in characters) are dropped.
    pub min_sentence_chars: usize,
    /// Upper bound on returned key points.
    pub max_points: usize,
    /// Sentences returned in original order when nothing scores.
    pub fallback_points: usize,
    /// Score added to sentences ending in `?` or `!`.
    pub punctuation_bonus: usize,
}

impl Default for KeyPointConfig {
    fn default() -> Self {
        Self {
            importance: words(&[
                "demand", "require", "must", "need", "want", "expect", "budget", "deadline",
                "urgent", "million", "thousand", "employees", "users", "issue", "problem",
                "error",
            ]),
            min_sentence_chars: 10,
            max_points: 5,
            fallback_points: 3,
            punctuation_bonus: 1,
        }
    }
}

/// A template used only for one `(intent, priority)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecializedTemplate {
    pub intent: Intent,
    pub priority: Priority,
    pub body: String,
}

/// Response templates.
///
/// Slots: `{sender}` (display name), `{subject}`, `{ticket}` and
/// `{context}` (knowledge-base lines, empty when there are none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Checked first, in order.
    pub specialized: Vec<SpecializedTemplate>,
    /// One per intent.
    pub generic: BTreeMap<Intent, String>,
    /// Prefix of generated ticket identifiers.
    pub ticket_prefix: String,
    /// Display name used when the sender address has no local part.
    pub fallback_sender_name: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        let specialized = vec![
            SpecializedTemplate {
                intent: Intent::Complaint,
                priority: Priority::Urgent,
                body: EMERGENCY_TEMPLATE.to_string(),
            },
            SpecializedTemplate {
                intent: Intent::SalesOpportunity,
                priority: Priority::High,
                body: ENTERPRISE_TEMPLATE.to_string(),
            },
        ];

        let generic = BTreeMap::from([
            (Intent::Complaint, COMPLAINT_TEMPLATE.to_string()),
            (Intent::SalesOpportunity, SALES_TEMPLATE.to_string()),
            (Intent::SupportRequest, SUPPORT_TEMPLATE.to_string()),
            (Intent::PricingInquiry, PRICING_TEMPLATE.to_string()),
            (Intent::GeneralInquiry, GENERAL_TEMPLATE.to_string()),
        ]);

        Self {
            specialized,
            generic,
            ticket_prefix: "CRITICAL".to_string(),
            fallback_sender_name: "Customer".to_string(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            thresholds: Thresholds::default(),
            key_points: KeyPointConfig::default(),
            templates: TemplateConfig::default(),
        }
    }
}

impl RuleConfig {
    /// Load from the file named by `INBOX_TRIAGE_RULES`, or the built-in
    /// defaults when it is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(RULES_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => {
                debug!("No rule file configured, using built-in rules");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load a JSON rule file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!(path = %path.display(), "Loaded rule configuration");
        Ok(config)
    }

    /// Parse a JSON rule document.
    ///
    /// Sections that are absent keep their defaults, and so do signals
    /// missing from `keywords`. A signal listed with an empty array is an
    /// error.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        for (signal, defaults) in default_keywords() {
            config.keywords.entry(signal).or_insert(defaults);
        }
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Keywords for one signal category.
    pub fn keywords(&self, signal: Signal) -> &[String] {
        self.keywords.get(&signal).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lower-case and trim every keyword so matching stays case-insensitive.
    pub(crate) fn normalize(&mut self) {
        for list in self.keywords.values_mut() {
            for keyword in list.iter_mut() {
                *keyword = keyword.trim().to_lowercase();
            }
        }
        for keyword in self.key_points.importance.iter_mut() {
            *keyword = keyword.trim().to_lowercase();
        }
        self.thresholds.subject_urgent_marker =
            self.thresholds.subject_urgent_marker.trim().to_lowercase();
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for signal in Signal::ALL {
            let list = self.keywords(signal);
            if list.is_empty() {
                return Err(ConfigError::EmptyKeywordList {
                    signal: signal.label().to_string(),
                });
            }
            if list.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("keywords.{}", signal.label()),
                    message: "blank keyword".to_string(),
                });
            }
        }

        let negative = self.keywords(Signal::Negative);
        if let Some(keyword) = self
            .keywords(Signal::Positive)
            .iter()
            .find(|k| negative.contains(*k))
        {
            return Err(ConfigError::OverlappingSentiment {
                keyword: keyword.clone(),
            });
        }

        if self.key_points.importance.is_empty() {
            return Err(ConfigError::EmptyKeywordList {
                signal: "key_points.importance".to_string(),
            });
        }
        if self.key_points.max_points == 0 {
            return Err(ConfigError::InvalidValue {
                key: "key_points.max_points".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.key_points.fallback_points > self.key_points.max_points {
            return Err(ConfigError::InvalidValue {
                key: "key_points.fallback_points".to_string(),
                message: "must not exceed max_points".to_string(),
            });
        }

        if self.thresholds.subject_urgent_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "thresholds.subject_urgent_marker".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        for intent in Intent::ALL {
            if !self.templates.generic.contains_key(&intent) {
                return Err(ConfigError::MissingTemplate {
                    intent: intent.label().to_string(),
                });
            }
        }

        Ok(())
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_keywords() -> BTreeMap<Signal, Vec<String>> {
    BTreeMap::from([
        (
            Signal::Crisis,
            words(&[
                "unacceptable", "lawsuit", "legal action", "sue you", "breach of contract",
                "system down", "system failure", "lost revenue", "losing money", "disaster",
                "incompetence", "terminate contract", "failed", "broken",
            ]),
        ),
        (
            Signal::Complaint,
            words(&[
                "complaint", "unhappy", "disappointed", "frustrated", "angry", "terrible",
                "awful", "worst", "disgusted", "unacceptable",
            ]),
        ),
        (
            Signal::Sales,
            words(&[
                "evaluation", "evaluating", "requirement", "deployment", "enterprise", "budget",
                "proposal", "rfp", "vendor", "implementation", "pilot", "trial", "demo", "users",
                "employees", "global", "scale",
            ]),
        ),
        (
            Signal::Support,
            words(&[
                "error", "bug", "issue", "problem", "not working", "broken", "help", "support",
                "technical", "troubleshoot", "fix", "resolve", "integration", "stopped working",
                "failing", "timeout", "can't", "unable", "failure", "not functioning",
            ]),
        ),
        (
            Signal::Pricing,
            words(&[
                "pricing", "cost", "price", "plan", "quote", "discount", "billing", "payment",
                "subscription", "fee", "charge",
            ]),
        ),
        (
            Signal::Urgent,
            words(&[
                "urgent", "asap", "immediately", "immediate", "critical", "emergency",
                "right now", "today", "deadline", "time sensitive",
            ]),
        ),
        (
            Signal::HighValue,
            words(&[
                "million", "billion", "thousand", "budget", "enterprise", "global deployment",
                "1m+", "10,000", "50,000", "100,000",
            ]),
        ),
        (
            Signal::Positive,
            words(&[
                "thank", "appreciate", "great", "excellent", "wonderful", "fantastic", "amazing",
                "pleased", "happy", "excited", "looking forward", "interested", "love", "awesome",
            ]),
        ),
        (
            Signal::Negative,
            words(&[
                "unacceptable", "terrible", "awful", "horrible", "worst", "angry", "furious",
                "frustrat", "disappointed", "upset", "disaster", "failure", "incompetent",
                "pathetic", "unhappy",
            ]),
        ),
        (
            Signal::DeploymentScale,
            words(&["deployment", "enterprise", "evaluation", "requirements"]),
        ),
        (
            Signal::EnterpriseCustom,
            words(&["enterprise", "custom", "deployment"]),
        ),
        (
            Signal::BudgetScale,
            words(&["budget", "000", "million", "employees"]),
        ),
        (
            Signal::Outage,
            words(&["broken", "is down", "went down", "outage", "not working"]),
        ),
        (Signal::Legal, words(&["legal", "lawsuit"])),
    ])
}

// ── Default templates ───────────────────────────────────────────────

const EMERGENCY_TEMPLATE: &str = "Dear {sender},

I am sorry for the critical situation you are facing. This is not the level of service we hold ourselves to.

Your case has been escalated to our executive team and our technical emergency response unit. Here is what happens next:

1. Our VP of Customer Success will call you within 30 minutes
2. Senior engineers are investigating with the highest priority
3. You will receive an incident report and resolution plan within 2 hours
4. We will review your account together, including compensation

Your direct escalation contacts:
- Emergency hotline: 1-800-555-0199
- Executive escalation: escalations@example.com
- Ticket: {ticket}

We are treating this with the severity it deserves and will keep you updated until it is resolved.

Sincerely,
Emergency Response Team";

const ENTERPRISE_TEMPLATE: &str = "Dear {sender},

Thank you for considering us for your enterprise deployment. Your requirements have been shared with our Enterprise Solutions team, and given the scale involved we would like to arrange:

1. A technical architecture review with our solutions architects
2. Our security and compliance documentation, including audit reports
3. An executive briefing to walk through your specific requirements
4. A proof-of-concept pilot for your team

We usually answer proposals within 48 hours and will prioritize yours to meet your timeline.{context}

Best regards,
Enterprise Solutions Team";

const COMPLAINT_TEMPLATE: &str = "Dear {sender},

We are sorry for the trouble you have experienced. We take your feedback seriously, and your concern has been escalated to our senior support team, who will contact you within 4 hours.

If you need us sooner, please call our priority support line at 1-800-555-0142.

Best regards,
Customer Success Team";

const SALES_TEMPLATE: &str = "Dear {sender},

Thank you for your interest. One of our solutions specialists will reach out this week to understand your needs and walk you through the options that fit them.{context}

Best regards,
Sales Team";

const SUPPORT_TEMPLATE: &str = "Dear {sender},

Thank you for contacting support. Your request has been logged and our support team will respond within 24 hours.{context}

In the meantime, our documentation and community forum cover many common questions.

Best regards,
Support Team";

const PRICING_TEMPLATE: &str = "Dear {sender},

Thank you for your interest in our plans. We offer three tiers:
- Starter: $49/month, for small teams
- Professional: $149/month, for growing businesses
- Enterprise: custom pricing for large organizations

Annual billing comes with a 10% discount, and every plan starts with a 14-day free trial.{context}

Would you like to schedule a call to find the plan that fits best?

Best regards,
Sales Team";

const GENERAL_TEMPLATE: &str = "Dear {sender},

Thank you for getting in touch. We have received your message regarding \"{subject}\" and will get back to you within 24-48 hours.{context}

Best regards,
Customer Team";
