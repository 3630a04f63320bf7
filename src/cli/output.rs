//! Output formatting helpers for CLI commands

use crate::metrics::MetricsSummary;
use crate::orchestrator::{ChatResult, DocumentAnalysis, ResponseSource};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

fn source_label(source: ResponseSource) -> String {
    match source {
        ResponseSource::Primary => "primary".green().to_string(),
        ResponseSource::Fallback => "fallback".yellow().to_string(),
        ResponseSource::Degraded => "degraded".red().to_string(),
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Pretty JSON for `--json` output
pub fn to_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Format a chat answer for humans
pub fn format_chat_result(result: &ChatResult) -> String {
    let mut out = format!(
        "{} (source: {}, confidence: {:.2})\n\n{}\n",
        "Concierge".bold(),
        source_label(result.source),
        result.confidence,
        result.response_text
    );

    if !result.suggested_actions.is_empty() || !result.next_steps.is_empty() {
        let mut table = new_table();
        table.set_header(vec!["Suggested actions", "Next steps"]);
        let actions: Vec<&String> = result.suggested_actions.iter().collect();
        let rows = actions.len().max(result.next_steps.len());
        for i in 0..rows {
            table.add_row(vec![
                Cell::new(actions.get(i).map(|s| s.as_str()).unwrap_or("")),
                Cell::new(result.next_steps.get(i).map(|s| s.as_str()).unwrap_or("")),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out
}

/// Format extracted document fields as a table
pub fn format_analysis_table(analysis: &DocumentAnalysis) -> String {
    let mut table = new_table();
    table.set_header(vec!["Field", "Value"]);

    let mut fields: Vec<_> = analysis.extracted_fields.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (name, value) in fields {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".dimmed().to_string(),
            other => other.to_string(),
        };
        table.add_row(vec![Cell::new(name), Cell::new(rendered)]);
    }

    let mut out = format!(
        "Source: {}  Confidence: {:.2}\n{}\n",
        source_label(analysis.source),
        analysis.confidence,
        table
    );
    for warning in &analysis.warnings {
        out.push_str(&format!("{} {}\n", "warning:".yellow(), warning));
    }
    out
}

/// Format the metrics summary as a table
pub fn format_summary_table(summary: &MetricsSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Model", "Calls", "Errors", "Cost (USD)", "Avg latency"]);

    for model in &summary.models {
        let errors = if model.errors > 0 {
            model.errors.to_string().red().to_string()
        } else {
            model.errors.to_string()
        };
        table.add_row(vec![
            Cell::new(&model.model),
            Cell::new(model.calls),
            Cell::new(errors),
            Cell::new(format!("{:.6}", model.cost_usd)),
            Cell::new(format!("{:.0}ms", model.average_duration_ms)),
        ]);
    }

    format!(
        "{}\n\nTotal: {}  Success: {}  Errors: {}  Pending: {}  Tokens: {}  Cost: ${:.6}",
        table,
        summary.total,
        summary.success,
        summary.errors,
        summary.pending,
        summary.total_tokens,
        summary.total_cost_usd
    )
}
