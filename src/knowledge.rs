//! Knowledge base: short reference entries quoted in replies.
//!
//! Lookups only decide which entries appear in a reply's `{context}` slot.
//! They never influence intent, priority, sentiment or escalation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Environment variable naming a JSON knowledge file.
pub const KNOWLEDGE_PATH_ENV: &str = "INBOX_TRIAGE_KNOWLEDGE";

/// Entries returned by a lookup when no limit is given.
pub const DEFAULT_LOOKUP_LIMIT: usize = 3;

/// Characters of entry content quoted in a reply.
const EXCERPT_CHARS: usize = 200;

/// Query words shorter than this are ignored.
const MIN_QUERY_WORD_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub title: String,
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

impl KnowledgeEntry {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            category: category.into(),
        }
    }

    /// `- {title}: {excerpt}` as it appears in a reply.
    pub fn context_line(&self) -> String {
        let excerpt: String = self.content.chars().take(EXCERPT_CHARS).collect();
        format!("- {}: {}", self.title, excerpt)
    }
}

/// Ordered collection of entries. Insertion order breaks ranking ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Load from the file named by `INBOX_TRIAGE_KNOWLEDGE`, if set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        match std::env::var(KNOWLEDGE_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                Self::from_file(Path::new(path.trim())).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Load a JSON array of entries.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let kb = Self::from_json(&raw)?;
        info!(path = %path.display(), entries = kb.len(), "Loaded knowledge base");
        Ok(kb)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let entries: Vec<KnowledgeEntry> =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self::new(entries))
    }

    pub fn add(&mut self, entry: KnowledgeEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Up to `limit` entries whose content mentions a query word,
    /// most matching words first.
    pub fn lookup(&self, query: &str, limit: usize) -> Vec<&KnowledgeEntry> {
        let query = query.to_lowercase();
        let mut words: Vec<&str> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= MIN_QUERY_WORD_CHARS)
            .collect();
        words.sort_unstable();
        words.dedup();

        if words.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, &KnowledgeEntry)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let content = entry.content.to_lowercase();
                let matches = words.iter().filter(|w| content.contains(*w)).count();
                (matches > 0).then_some((matches, entry))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        debug!(candidates = ranked.len(), limit, "Knowledge lookup");
        ranked.into_iter().take(limit).map(|(_, e)| e).collect()
    }

    /// Rendered lines for the `{context}` slot of a reply.
    pub fn context_lines(&self, query: &str, limit: usize) -> Vec<String> {
        self.lookup(query, limit)
            .into_iter()
            .map(KnowledgeEntry::context_line)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            KnowledgeEntry::new(
                "Product Overview",
                "An email automation platform with smart categorization and integrations.",
                "product",
            ),
            KnowledgeEntry::new(
                "Security & Compliance",
                "SOC 2 Type II certified and GDPR compliant. Data is encrypted at rest.",
                "security",
            ),
            KnowledgeEntry::new(
                "Integration Guide",
                "Integrates with Gmail, Outlook and Salesforce. API access for custom integrations.",
                "technical",
            ),
        ])
    }

    #[test]
    fn lookup_ranks_by_matching_words() {
        let kb = sample();
        let hits = kb.lookup("Our Salesforce integration broke, is the API down?", 3);
        let titles: Vec<_> = hits.iter().map(|e| e.title.as_str()).collect();
        // "salesforce" and "integration" match the guide; "integration" alone
        // matches the overview.
        assert_eq!(titles, ["Integration Guide", "Product Overview"]);
    }

    #[test]
    fn lookup_respects_limit() {
        let kb = sample();
        let hits = kb.lookup("integration gdpr", 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let kb = sample();
        let hits = kb.lookup("data integrations", 3);
        let titles: Vec<_> = hits.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Product Overview", "Security & Compliance", "Integration Guide"]
        );
    }

    #[test]
    fn short_words_are_ignored() {
        let kb = sample();
        assert!(kb.lookup("API SOC at", 3).is_empty());
        assert!(KnowledgeBase::default().lookup("integration", 3).is_empty());
    }

    #[test]
    fn context_line_truncates_content() {
        let entry = KnowledgeEntry::new("Long", "x".repeat(500), "general");
        let line = entry.context_line();
        assert_eq!(line, format!("- Long: {}", "x".repeat(200)));
    }

    #[test]
    fn from_json_defaults_category() {
        let kb = KnowledgeBase::from_json(r#"[{"title": "FAQ", "content": "Answers"}]"#).unwrap();
        assert_eq!(kb.entries()[0].category, "general");
    }

    #[test]
    fn from_file_reads_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, r#"[{"title": "A", "content": "alpha", "category": "x"}]"#).unwrap();
        let kb = KnowledgeBase::from_file(&path).unwrap();
        assert_eq!(kb.len(), 1);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            KnowledgeBase::from_json("{"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
