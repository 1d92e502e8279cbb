//! Inbox Triage, deterministic classification of inbound customer messages.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod pipeline;

pub use config::RuleConfig;
pub use error::{ConfigError, InputError, LlmError};
pub use knowledge::{KnowledgeBase, KnowledgeEntry};
pub use pipeline::engine::{Classifier, RuleBasedClassifier};
pub use pipeline::processor::{BatchReport, MessageProcessor, TriageStats};
pub use pipeline::types::{Classification, Intent, Message, Priority, ProcessedMessage, Sentiment};
