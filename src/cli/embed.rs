//! Embed command implementation

use crate::cli::{load_config, output, EmbedArgs};
use crate::logging::init_tracing;
use crate::metrics::TracingSink;
use crate::orchestrator::Orchestrator;
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;

/// Values shown before the vector is elided in human output.
const PREVIEW_VALUES: usize = 8;

/// Handle `concierge embed` command
pub async fn run_embed(args: EmbedArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.common.config, args.common.log_level.as_deref())?;
    init_tracing(&config.logging)?;

    let orchestrator = Orchestrator::from_config(&config, Arc::new(TracingSink))?;
    let vector = orchestrator.embed(&args.text).await;
    orchestrator.metrics().flush().await;
    let vector = vector?;

    if args.common.json {
        println!(
            "{}",
            output::to_json(&json!({ "dimensions": vector.len(), "embedding": vector }))?
        );
    } else {
        let preview: Vec<String> = vector
            .iter()
            .take(PREVIEW_VALUES)
            .map(|v| format!("{:.4}", v))
            .collect();
        println!("{} {} dimensions", "✓".green(), vector.len());
        println!("[{}{}]", preview.join(", "), if vector.len() > PREVIEW_VALUES { ", …" } else { "" });
    }

    Ok(())
}
