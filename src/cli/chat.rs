//! Chat command implementation

use crate::cli::{load_config, output, ChatArgs};
use crate::logging::init_tracing;
use crate::metrics::{setup_metrics, FanoutSink, MonitoringSink, PrometheusSink, TracingSink};
use crate::orchestrator::{CallContext, ChatRequest, Orchestrator};
use crate::provider::ChatTurn;
use std::path::Path;
use std::sync::Arc;

/// Read prior conversation turns from a JSON array.
pub fn read_history(path: &Path) -> Result<Vec<ChatTurn>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read history file {}: {}", path.display(), e))?;
    let turns: Vec<ChatTurn> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid history file {}: {}", path.display(), e))?;
    Ok(turns)
}

/// Handle `concierge chat` command
pub async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.common.config, args.common.log_level.as_deref())?;
    init_tracing(&config.logging)?;

    let prometheus = if args.metrics {
        Some(setup_metrics()?)
    } else {
        None
    };
    let sink: Arc<dyn MonitoringSink> = match prometheus {
        Some(_) => Arc::new(FanoutSink::new(vec![
            Arc::new(TracingSink),
            Arc::new(PrometheusSink),
        ])),
        None => Arc::new(TracingSink),
    };

    let history = match &args.history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };

    let orchestrator = Orchestrator::from_config(&config, sink)?;

    let mut context = CallContext::new(args.division);
    context.stage = args.stage;
    context.is_admin = args.admin;
    let request = ChatRequest::new(args.message)
        .with_history(history)
        .with_context(context);

    let result = orchestrator.chat(&request).await;

    if args.common.json {
        println!("{}", output::to_json(&result)?);
    } else {
        println!("{}", output::format_chat_result(&result));
    }

    orchestrator.metrics().flush().await;

    if let Some(handle) = prometheus {
        println!("{}", output::format_summary_table(&orchestrator.metrics().summary()));
        println!();
        println!("{}", handle.render());
    }

    Ok(())
}
