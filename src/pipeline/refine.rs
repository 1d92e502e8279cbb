//! Priority and sentiment refinement.
//!
//! Runs after the cascade. Priority can only move up from the cascade's
//! base; sentiment is derived from the positive/negative lists and the
//! shouting heuristics; escalation is decided last, from everything above.

use tracing::debug;

use crate::config::Thresholds;
use crate::pipeline::rules::Resolution;
use crate::pipeline::signals::SignalCounts;
use crate::pipeline::types::{Intent, Priority, Sentiment, Signal};

/// Refined fields that go straight into the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    pub priority: Priority,
    pub sentiment: Sentiment,
    pub requires_human: bool,
}

/// Adjust priority, derive sentiment, and decide escalation.
pub fn refine(resolution: &Resolution, counts: &SignalCounts, thresholds: &Thresholds) -> Refinement {
    let priority = refine_priority(resolution.priority, counts, thresholds);
    let sentiment = sentiment(counts, thresholds);
    let requires_human = requires_human(resolution.intent, priority, counts, thresholds);

    if priority != resolution.priority {
        debug!(
            from = %resolution.priority,
            to = %priority,
            "Priority raised"
        );
    }
    if requires_human {
        debug!(intent = %resolution.intent, priority = %priority, "Escalating to human");
    }

    Refinement {
        priority,
        sentiment,
        requires_human,
    }
}

/// Raise, never lower: urgency tokens lift to urgent, high-value tokens
/// lift normal to high.
pub fn refine_priority(base: Priority, counts: &SignalCounts, thresholds: &Thresholds) -> Priority {
    let mut priority = base;

    if counts.urgency(thresholds) {
        priority = priority.max(Priority::Urgent);
    }

    if priority == Priority::Normal && high_value(counts, thresholds) {
        priority = Priority::High;
    }

    priority
}

fn high_value(counts: &SignalCounts, thresholds: &Thresholds) -> bool {
    counts.content(Signal::HighValue) > 0
        || counts.side.large_number
        || counts
            .side
            .max_amount()
            .is_some_and(|amount| amount >= thresholds.high_value_amount)
}

/// Mixed signals are neutral, even when the caps or exclamation
/// heuristics would otherwise tip the tone negative.
pub fn sentiment(counts: &SignalCounts, thresholds: &Thresholds) -> Sentiment {
    let positive = counts.content(Signal::Positive);
    let negative = counts.content(Signal::Negative);

    if positive > 0 && negative > 0 {
        return Sentiment::Neutral;
    }

    if negative > positive
        || counts.side.caps_words > thresholds.negative_caps_words
        || counts.side.exclamations > thresholds.negative_exclamations
    {
        Sentiment::Negative
    } else if positive > negative {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

/// High or urgent priority always escalates; so do complaints, legal
/// threats and very large amounts.
pub fn requires_human(
    intent: Intent,
    priority: Priority,
    counts: &SignalCounts,
    thresholds: &Thresholds,
) -> bool {
    priority.is_elevated()
        || intent == Intent::Complaint
        || counts.content(Signal::Legal) > 0
        || counts
            .side
            .max_amount()
            .is_some_and(|amount| amount >= thresholds.very_large_amount)
}
