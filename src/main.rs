use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use inbox_triage::knowledge::KnowledgeBase;
use inbox_triage::pipeline::engine::RuleBasedClassifier;
use inbox_triage::pipeline::processor::{MessageProcessor, TriageStats};
use inbox_triage::RuleConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON lines
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = RuleConfig::from_env().context("Failed to load rule configuration")?;
    let mut engine = RuleBasedClassifier::new(config)?;
    if let Some(kb) = KnowledgeBase::from_env().context("Failed to load knowledge base")? {
        engine = engine.with_knowledge(kb);
    }
    let processor = MessageProcessor::new(Arc::new(engine));

    let stats = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {path}"))?;
            info!(path = %path, "Reading messages from file");
            run(&processor, BufReader::new(file)).await?
        }
        None => run(&processor, BufReader::new(tokio::io::stdin())).await?,
    };

    info!(
        total = stats.total,
        requires_human = stats.requires_human,
        by_intent = %serde_json::to_string(&stats.by_intent)?,
        by_priority = %serde_json::to_string(&stats.by_priority)?,
        by_sentiment = %serde_json::to_string(&stats.by_sentiment)?,
        "Triage complete"
    );
    Ok(())
}

/// Classify one JSON message per line, printing one JSON result per line.
async fn run<R>(processor: &MessageProcessor, reader: R) -> anyhow::Result<TriageStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = TriageStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let output = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => match processor.process_value(&value).await {
                Ok(processed) => {
                    stats.record(&processed.classification);
                    serde_json::to_string(&processed)?
                }
                Err(e) => {
                    warn!(error = %e, "Rejected message");
                    serde_json::json!({ "error": e.to_string() }).to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Skipping malformed JSON line");
                serde_json::json!({ "error": format!("Malformed message: {e}") }).to_string()
            }
        };
        println!("{output}");
    }

    Ok(stats)
}
