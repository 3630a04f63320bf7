//! Structured logging setup and helpers.
//!
//! Events go to stderr so command output on stdout stays machine-readable.

use crate::config::{LogFormat, LoggingConfig};
use crate::prompt::truncate_chars;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Characters kept when user content is logged.
pub const CONTENT_PREVIEW_CHARS: usize = 100;

/// Build filter directives string from LoggingConfig
///
/// Produces `"<level>,concierge::<component>=<level>,..."`, with components
/// in sorted order.
///
/// # Examples
///
/// ```
/// use concierge::config::{LogFormat, LoggingConfig};
/// use concierge::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("resilience".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
///     enable_content_logging: false,
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,concierge::resilience=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",concierge::{}={}", component, level));
        }
    }

    filter_str
}

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.enable_content_logging {
        eprintln!("WARNING: Content logging is enabled. Client messages will be logged.");
        eprintln!("         This may include personal financial data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

/// Single-line preview of user content for debug logs.
pub fn content_preview(text: &str) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    truncate_chars(&flattened, CONTENT_PREVIEW_CHARS).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_filter_without_components() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_directives(&config), "info");
    }

    #[test]
    fn test_filter_components_sorted() {
        let mut levels = HashMap::new();
        levels.insert("provider".to_string(), "warn".to_string());
        levels.insert("metrics".to_string(), "trace".to_string());
        let config = LoggingConfig {
            level: "debug".to_string(),
            component_levels: Some(levels),
            ..LoggingConfig::default()
        };

        assert_eq!(
            build_filter_directives(&config),
            "debug,concierge::metrics=trace,concierge::provider=warn"
        );
    }

    #[test]
    fn test_content_preview_flattens_and_truncates() {
        let long = format!("line one\nline two {}", "x".repeat(200));
        let preview = content_preview(&long);

        assert!(!preview.contains('\n'));
        assert!(preview.starts_with("line one line two"));
        assert_eq!(preview.chars().count(), CONTENT_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_content_preview_short_text_unchanged() {
        assert_eq!(content_preview("hello"), "hello");
    }
}
