//! Response composition: key points and a templated reply.
//!
//! Key points are the body sentences that carry importance words (or end
//! in a question or exclamation), highest score first. The reply is the
//! template for the final intent and priority with the sender's display
//! name, the subject, a ticket id and optional knowledge-base context
//! substituted in.

use chrono::{DateTime, Utc};

use crate::config::{KeyPointConfig, TemplateConfig};
use crate::pipeline::signals::count_hits;
use crate::pipeline::types::{Intent, Message, Priority};

// ── Clock ───────────────────────────────────────────────────────────

/// Source of the current time, injected so ticket ids are reproducible.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ── Key points ──────────────────────────────────────────────────────

/// A body sentence and the punctuation that closed it, if any.
struct Sentence<'a> {
    text: &'a str,
    terminator: Option<char>,
}

fn split_sentences(content: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (idx, ch) in content.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            sentences.push(Sentence {
                text: content[start..idx].trim(),
                terminator: Some(ch),
            });
            start = idx + ch.len_utf8();
        }
    }
    if start < content.len() {
        sentences.push(Sentence {
            text: content[start..].trim(),
            terminator: None,
        });
    }

    sentences
}

/// Up to `max_points` sentences, most important first.
///
/// Sentences shorter than `min_sentence_chars` are ignored. When no
/// sentence scores, the first `fallback_points` are returned in order.
pub fn key_points(content: &str, config: &KeyPointConfig) -> Vec<String> {
    let eligible: Vec<Sentence<'_>> = split_sentences(content)
        .into_iter()
        .filter(|s| s.text.chars().count() >= config.min_sentence_chars)
        .collect();

    let mut scored: Vec<(usize, &str)> = eligible
        .iter()
        .map(|s| {
            let mut score = count_hits(&config.importance, &s.text.to_lowercase());
            if matches!(s.terminator, Some('?' | '!')) {
                score += config.punctuation_bonus;
            }
            (score, s.text)
        })
        .filter(|(score, _)| *score > 0)
        .collect();

    if scored.is_empty() {
        return eligible
            .iter()
            .take(config.fallback_points)
            .map(|s| s.text.to_string())
            .collect();
    }

    // Stable, so equal scores keep their order in the body.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(config.max_points)
        .map(|(_, text)| text.to_string())
        .collect()
}

// ── Reply ───────────────────────────────────────────────────────────

/// Friendly name from an address: `jane.doe@example.com` → `Jane Doe`.
pub fn display_name(sender: &str, fallback: &str) -> String {
    let local = sender.split('@').next().unwrap_or_default().replace('.', " ");

    let mut name = String::with_capacity(local.len());
    let mut in_word = false;
    for ch in local.trim().chars() {
        if ch.is_alphabetic() {
            if in_word {
                name.extend(ch.to_lowercase());
            } else {
                name.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            name.push(ch);
            in_word = false;
        }
    }

    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

/// Ticket identifier for escalated replies, e.g. `CRITICAL-20250115-0930`.
pub fn ticket_id(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", prefix, now.format("%Y%m%d-%H%M"))
}

/// The template for `(intent, priority)`: a specialized one if configured,
/// else the generic template for the intent.
pub fn select_template(templates: &TemplateConfig, intent: Intent, priority: Priority) -> &str {
    templates
        .specialized
        .iter()
        .find(|t| t.intent == intent && t.priority == priority)
        .map(|t| t.body.as_str())
        .or_else(|| templates.generic.get(&intent).map(String::as_str))
        .unwrap_or_default()
}

/// Fill the reply template. `context` lines are appended after the main
/// paragraph when the template has a `{context}` slot.
pub fn compose_response(
    message: &Message,
    intent: Intent,
    priority: Priority,
    templates: &TemplateConfig,
    now: DateTime<Utc>,
    context: &[String],
) -> String {
    let sender = display_name(&message.sender, &templates.fallback_sender_name);
    let ticket = ticket_id(&templates.ticket_prefix, now);
    let context = if context.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", context.join("\n"))
    };

    render(
        select_template(templates, intent, priority),
        &[
            ("sender", &sender),
            ("subject", &message.subject),
            ("ticket", &ticket),
            ("context", &context),
        ],
    )
}

/// Single-pass `{slot}` substitution. Unknown slots are left as written,
/// and substituted values are never rescanned.
fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            slots
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
