//! Message classification pipeline.
//!
//! Every message flows strictly left to right through four stages:
//! 1. `signals::extract()`: keyword hits and numeric side-signals
//! 2. `rules::resolve()`: ordered cascade picks intent and base priority
//! 3. `refine::refine()`: raises priority, derives sentiment, decides escalation
//! 4. `compose`: key points and a templated reply
//!
//! `engine::RuleBasedClassifier` wires the stages together and
//! `processor::MessageProcessor` runs any `Classifier` over inbound batches.

pub mod compose;
pub mod engine;
pub mod processor;
pub mod refine;
pub mod rules;
pub mod signals;
pub mod types;
