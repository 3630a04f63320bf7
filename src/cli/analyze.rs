//! Analyze command implementation

use crate::cli::{load_config, output, AnalyzeArgs};
use crate::logging::init_tracing;
use crate::metrics::TracingSink;
use crate::orchestrator::Orchestrator;
use crate::provider::DocumentRef;
use std::sync::Arc;

/// Handle `concierge analyze` command
pub async fn run_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.common.config, args.common.log_level.as_deref())?;
    init_tracing(&config.logging)?;

    let orchestrator = Orchestrator::from_config(&config, Arc::new(TracingSink))?;

    let mut document = DocumentRef::new(args.url);
    if let Some(mime) = args.mime {
        document = document.with_mime_type(mime);
    }

    let analysis = orchestrator.analyze_document(&document, args.kind).await;
    orchestrator.metrics().flush().await;
    let analysis = analysis?;

    if args.common.json {
        println!("{}", output::to_json(&analysis)?);
    } else {
        print!("{}", output::format_analysis_table(&analysis));
    }

    Ok(())
}
