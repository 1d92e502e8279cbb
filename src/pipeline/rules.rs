//! Category resolver: an ordered rule cascade over signal counts.
//!
//! Rules are evaluated top-down and the first match wins:
//! 1. Crisis → urgent complaint
//! 2. Strong complaint → high complaint
//! 3. Sales opportunity → high
//! 4. Support with an urgent or broken subject → urgent support
//! 5. Support → normal (high when an urgency token is present)
//! 6. Pricing → normal pricing inquiry
//!
//! Anything else is a normal general inquiry. Thresholds are `>=`, so a
//! message that satisfies several rules lands on the earliest one: the order
//! of the cascade is the tie-break.

use tracing::debug;

use crate::config::{RuleConfig, Thresholds};
use crate::pipeline::signals::SignalCounts;
use crate::pipeline::types::{Intent, Priority, Signal};

/// Outcome of the cascade: intent plus the base priority before refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub intent: Intent,
    pub priority: Priority,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

/// What a matched rule assigns as base priority.
#[derive(Debug, Clone, Copy)]
enum BasePriority {
    Fixed(Priority),
    /// `raised` when an urgency token is present, else `base`.
    RaisedOnUrgency { base: Priority, raised: Priority },
}

/// Everything a rule predicate may look at.
pub struct RuleInputs<'a> {
    pub counts: &'a SignalCounts,
    /// Lower-cased subject line.
    pub subject: &'a str,
    pub thresholds: &'a Thresholds,
}

impl RuleInputs<'_> {
    fn subject_marked_urgent(&self) -> bool {
        self.subject.contains(self.thresholds.subject_urgent_marker.as_str())
    }

    fn content(&self, signal: Signal) -> usize {
        self.counts.content(signal)
    }
}

/// A single cascade entry: (predicate, intent, priority).
pub struct CascadeRule {
    pub name: &'static str,
    pub intent: Intent,
    priority: BasePriority,
    predicate: fn(&RuleInputs<'_>) -> bool,
}

impl CascadeRule {
    pub fn matches(&self, inputs: &RuleInputs<'_>) -> bool {
        (self.predicate)(inputs)
    }
}

/// The cascade, in evaluation order. The default rule is not listed.
pub static CASCADE: [CascadeRule; 6] = [
    CascadeRule {
        name: "crisis",
        intent: Intent::Complaint,
        priority: BasePriority::Fixed(Priority::Urgent),
        predicate: |r| {
            r.content(Signal::Crisis) >= r.thresholds.crisis
                || (r.subject_marked_urgent()
                    && r.content(Signal::Complaint) >= r.thresholds.subject_complaint)
        },
    },
    CascadeRule {
        name: "strong_complaint",
        intent: Intent::Complaint,
        priority: BasePriority::Fixed(Priority::High),
        predicate: |r| r.content(Signal::Complaint) >= r.thresholds.strong_complaint,
    },
    CascadeRule {
        name: "sales_opportunity",
        intent: Intent::SalesOpportunity,
        priority: BasePriority::Fixed(Priority::High),
        predicate: |r| {
            let sales = r.content(Signal::Sales);
            (sales >= r.thresholds.sales && r.counts.present(Signal::DeploymentScale))
                || (r.content(Signal::Pricing) >= r.thresholds.enterprise_pricing
                    && r.counts.present(Signal::EnterpriseCustom))
                || (sales >= r.thresholds.sales_with_budget
                    && r.counts.present(Signal::BudgetScale))
        },
    },
    CascadeRule {
        name: "urgent_support",
        intent: Intent::SupportRequest,
        priority: BasePriority::Fixed(Priority::Urgent),
        predicate: |r| {
            r.content(Signal::Support) >= r.thresholds.urgent_support
                && (r.subject_marked_urgent() || r.counts.subject(Signal::Outage) > 0)
        },
    },
    CascadeRule {
        name: "support",
        intent: Intent::SupportRequest,
        priority: BasePriority::RaisedOnUrgency {
            base: Priority::Normal,
            raised: Priority::High,
        },
        predicate: |r| r.content(Signal::Support) >= r.thresholds.support,
    },
    CascadeRule {
        name: "pricing",
        intent: Intent::PricingInquiry,
        priority: BasePriority::Fixed(Priority::Normal),
        predicate: |r| r.content(Signal::Pricing) >= r.thresholds.pricing,
    },
];

/// Pick an intent and base priority for the extracted signals.
pub fn resolve(counts: &SignalCounts, subject: &str, config: &RuleConfig) -> Resolution {
    let subject = subject.to_lowercase();
    let inputs = RuleInputs {
        counts,
        subject: &subject,
        thresholds: &config.thresholds,
    };

    let resolution = CASCADE
        .iter()
        .find(|rule| rule.matches(&inputs))
        .map(|rule| Resolution {
            intent: rule.intent,
            priority: match rule.priority {
                BasePriority::Fixed(p) => p,
                BasePriority::RaisedOnUrgency { base, raised } => {
                    if counts.urgency(&config.thresholds) {
                        raised
                    } else {
                        base
                    }
                }
            },
            rule: rule.name,
        })
        .unwrap_or(Resolution {
            intent: Intent::GeneralInquiry,
            priority: Priority::Normal,
            rule: "default",
        });

    debug!(
        rule = resolution.rule,
        intent = %resolution.intent,
        priority = %resolution.priority,
        "Cascade resolved"
    );
    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::signals::extract;
    use crate::pipeline::types::Message;

    fn resolve_message(subject: &str, content: &str) -> Resolution {
        let config = RuleConfig::default();
        let message = Message::new("someone@example.com", subject, content);
        let counts = extract(&message, &config);
        resolve(&counts, &message.subject, &config)
    }

    #[test]
    fn two_crisis_terms_make_an_urgent_complaint() {
        let r = resolve_message("Outage", "This is unacceptable. Expect a lawsuit.");
        assert_eq!(r.intent, Intent::Complaint);
        assert_eq!(r.priority, Priority::Urgent);
        assert_eq!(r.rule, "crisis");
    }

    #[test]
    fn urgent_subject_with_one_complaint_is_a_crisis() {
        let r = resolve_message("URGENT: billing", "I am very disappointed with the invoice.");
        assert_eq!(r.rule, "crisis");
        assert_eq!(r.priority, Priority::Urgent);
    }

    #[test]
    fn two_complaint_terms_make_a_high_complaint() {
        let r = resolve_message("Feedback", "I'm frustrated and disappointed with the service.");
        assert_eq!(r.intent, Intent::Complaint);
        assert_eq!(r.priority, Priority::High);
        assert_eq!(r.rule, "strong_complaint");
    }

    #[test]
    fn sales_with_deployment_scale_is_an_opportunity() {
        let r = resolve_message(
            "Vendor selection",
            "We're evaluating vendors for a company-wide deployment.",
        );
        assert_eq!(r.intent, Intent::SalesOpportunity);
        assert_eq!(r.priority, Priority::High);
    }

    #[test]
    fn enterprise_pricing_is_an_opportunity() {
        let r = resolve_message("Question", "Do you offer custom pricing?");
        assert_eq!(r.intent, Intent::SalesOpportunity);
    }

    #[test]
    fn technical_evaluation_resolves_to_sales() {
        let r = resolve_message(
            "Technical evaluation questions",
            "We need: Kubernetes deployment, 99.99% SLA, GDPR compliance, SOC2, \
             multi-region support, custom ML models, 10k requests/sec. Also need on-premise \
             option. What's your enterprise pricing?",
        );
        assert_eq!(r.intent, Intent::SalesOpportunity);
        assert_eq!(r.priority, Priority::High);
    }

    #[test]
    fn support_with_broken_subject_is_urgent() {
        let r = resolve_message("Dashboard broken", "Please help, nothing loads.");
        assert_eq!(r.intent, Intent::SupportRequest);
        assert_eq!(r.priority, Priority::Urgent);
        assert_eq!(r.rule, "urgent_support");
    }

    #[test]
    fn plain_support_is_normal() {
        let r = resolve_message(
            "API Authentication Error",
            "Getting 401 error when calling your API. Can you help troubleshoot?",
        );
        assert_eq!(r.intent, Intent::SupportRequest);
        assert_eq!(r.priority, Priority::Normal);
        assert_eq!(r.rule, "support");
    }

    #[test]
    fn support_with_urgency_token_is_high() {
        let r = resolve_message("Login", "There is an error on login, please help asap.");
        assert_eq!(r.rule, "support");
        assert_eq!(r.priority, Priority::High);
    }

    #[test]
    fn pricing_question_is_a_pricing_inquiry() {
        let r = resolve_message("Pricing information", "Hi, what are your pricing plans?");
        assert_eq!(r.intent, Intent::PricingInquiry);
        assert_eq!(r.priority, Priority::Normal);
    }

    #[test]
    fn nothing_matched_is_a_general_inquiry() {
        let r = resolve_message("Hello", "Just saying hi.");
        assert_eq!(r.intent, Intent::GeneralInquiry);
        assert_eq!(r.priority, Priority::Normal);
        assert_eq!(r.rule, "default");
    }

    #[test]
    fn earliest_rule_wins_when_several_match() {
        // Crisis (rule 1) and pricing (rule 6) both match.
        let r = resolve_message(
            "Billing",
            "Your billing system failed and it is unacceptable.",
        );
        assert_eq!(r.rule, "crisis");

        // Strong complaint (rule 2) and support (rule 5) both match.
        let r = resolve_message(
            "Support",
            "Terrible support, awful experience, and the bug is still there. Please fix it.",
        );
        assert_eq!(r.rule, "strong_complaint");
    }

    #[test]
    fn thresholds_come_from_config() {
        let mut config = RuleConfig::default();
        config.thresholds.pricing = 2;
        let message = Message::new("a@b.com", "Quote", "Can I get a quote?");
        let counts = extract(&message, &config);
        assert_eq!(
            resolve(&counts, &message.subject, &config).intent,
            Intent::GeneralInquiry
        );
    }

    #[test]
    fn cascade_order_is_stable() {
        let names: Vec<_> = CASCADE.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "crisis",
                "strong_complaint",
                "sales_opportunity",
                "urgent_support",
                "support",
                "pricing"
            ]
        );
    }
}
