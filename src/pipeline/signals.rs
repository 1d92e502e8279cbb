//! Signal extraction: keyword hits and numeric side-signals.
//!
//! Subject and content are lower-cased independently and scanned for every
//! keyword list in the `RuleConfig`. A hit is substring containment, and each
//! list entry counts at most once per field. Subject counts are kept apart
//! from content counts because some cascade rules look only at the subject.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::{RuleConfig, Thresholds};
use crate::pipeline::types::{Message, Signal};

/// `$` followed by a number and an optional magnitude suffix.
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)\s*(k|mm|m|bn|b|thousand|million|billion)?\b")
        .expect("valid amount regex")
});

/// A number with an optional magnitude suffix and an optional unit noun.
static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)(?:\s*(k|mm|m|bn|b|thousand|million|billion)\b)?(?:\+?\s*(users|employees|seats|licenses|requests|emails|messages|customers|accounts|people|devices|transactions|records|members|locations)\b)?",
    )
    .expect("valid number regex")
});

/// Keyword hit counts per signal category, plus side-signals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignalCounts {
    content: BTreeMap<Signal, usize>,
    subject: BTreeMap<Signal, usize>,
    pub side: SideSignals,
}

impl SignalCounts {
    /// Hits in the message body.
    pub fn content(&self, signal: Signal) -> usize {
        self.content.get(&signal).copied().unwrap_or(0)
    }

    /// Hits in the subject line.
    pub fn subject(&self, signal: Signal) -> usize {
        self.subject.get(&signal).copied().unwrap_or(0)
    }

    /// At least one hit in either field.
    pub fn present(&self, signal: Signal) -> bool {
        self.content(signal) > 0 || self.subject(signal) > 0
    }

    /// An urgency keyword in the body, or enough exclamation marks.
    pub fn urgency(&self, thresholds: &Thresholds) -> bool {
        self.content(Signal::Urgent) > 0 || self.side.exclamations >= thresholds.urgent_exclamations
    }
}

/// Numeric evidence that is not a keyword count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SideSignals {
    /// `!` characters in the body.
    pub exclamations: usize,
    /// Body words with no lower-case letters, at least one upper-case
    /// letter, and at least `caps_word_min_chars` characters.
    pub caps_words: usize,
    /// Dollar amounts mentioned in the body, in dollars.
    pub amounts: Vec<Decimal>,
    /// The body mentions a quantity at or above the large-number threshold.
    pub large_number: bool,
}

impl SideSignals {
    pub fn max_amount(&self) -> Option<Decimal> {
        self.amounts.iter().copied().max()
    }
}

/// Scan a message for every configured signal.
///
/// Never fails; an empty body yields zero content counts.
pub fn extract(message: &Message, config: &RuleConfig) -> SignalCounts {
    let content = message.content.to_lowercase();
    let subject = message.subject.to_lowercase();

    let mut counts = SignalCounts::default();
    for signal in Signal::ALL {
        let keywords = config.keywords(signal);
        counts.content.insert(signal, count_hits(keywords, &content));
        counts.subject.insert(signal, count_hits(keywords, &subject));
    }

    let thresholds = &config.thresholds;
    counts.side = SideSignals {
        exclamations: message.content.matches('!').count(),
        caps_words: count_caps_words(&message.content, thresholds.caps_word_min_chars),
        amounts: parse_amounts(&content),
        large_number: parse_quantities(&content)
            .into_iter()
            .any(|n| n >= thresholds.large_number),
    };

    counts
}

/// Number of list entries found anywhere in `text`.
pub fn count_hits(keywords: &[String], text: &str) -> usize {
    keywords
        .iter()
        .filter(|k| text.contains(k.as_str()))
        .count()
}

fn count_caps_words(text: &str, min_chars: usize) -> usize {
    text.split_whitespace()
        .filter(|word| {
            word.chars().count() >= min_chars
                && word.chars().any(char::is_uppercase)
                && !word.chars().any(char::is_lowercase)
        })
        .count()
}

/// Dollar amounts in lower-cased text: `$2 million`, `$500k`, `$1,250.50`.
pub fn parse_amounts(text: &str) -> Vec<Decimal> {
    AMOUNT_PATTERN
        .captures_iter(text)
        .filter_map(|caps| scaled(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str())))
        .collect()
}

/// Quantities in lower-cased text: `50,000`, `10k`, `1m+ emails`, `12000 seats`.
///
/// A bare run of digits is not a quantity. Order numbers, zip codes and
/// invoice ids look the same as counts, so a number only qualifies when it
/// is comma-grouped, carries a magnitude suffix, or names a unit.
pub fn parse_quantities(text: &str) -> Vec<Decimal> {
    NUMBER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let digits = caps.get(1)?.as_str();
            let suffix = caps.get(2).map(|m| m.as_str());
            let qualified = digits.contains(',') || suffix.is_some() || caps.get(3).is_some();
            if !qualified {
                return None;
            }
            scaled(digits, suffix)
        })
        .collect()
}

fn scaled(digits: &str, suffix: Option<&str>) -> Option<Decimal> {
    let value = Decimal::from_str(&digits.replace(',', "")).ok()?;
    let multiplier = match suffix {
        None => Decimal::ONE,
        Some("k" | "thousand") => Decimal::from(1_000),
        Some("m" | "mm" | "million") => Decimal::from(1_000_000),
        Some("b" | "bn" | "billion") => Decimal::from(1_000_000_000),
        Some(_) => return None,
    };
    value.checked_mul(multiplier)
}
