//! Output formatters for generated sections.

use clap::ValueEnum;

use crate::commands::Section;

/// Output format for generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Commented SQL script
    Text,
    /// JSON array of `{title, body}` objects
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render sections in the requested format.
pub fn render(format: OutputFormat, sections: &[Section]) -> String {
    match format {
        OutputFormat::Text => sections
            .iter()
            .map(|s| format!("-- {}\n{}", s.title, s.body))
            .collect::<Vec<_>>()
            .join("\n\n"),
        OutputFormat::Json => {
            let items: Vec<_> = sections
                .iter()
                .map(|s| serde_json::json!({ "title": s.title, "body": s.body }))
                .collect();
            serde_json::Value::Array(items).to_string()
        }
    }
}
