//! LLM integration for inbox triage.
//!
//! The crate ships no network client. `LlmProvider` is the seam a deployment
//! implements for its model of choice, and `ModelBackedClassifier` consults
//! it before falling back to the rule engine.

pub mod classifier;
pub mod provider;

pub use classifier::ModelBackedClassifier;
pub use provider::*;
