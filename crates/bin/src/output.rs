//! Output formatting helpers for human-readable and JSON output.

use serde_json::Value;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Print one document in the selected format.
pub fn print_document(document: &Value, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Human => println!("{}", serde_json::to_string_pretty(document)?),
        OutputFormat::Json => println!("{}", serde_json::to_string(document)?),
    }
    Ok(())
}

/// Print a labelled value on one line, aligned like a table column.
pub fn print_field(label: &str, value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Human => println!("{:<12} {value}", format!("{label}:")),
        OutputFormat::Json => println!("{}", serde_json::json!({ label: value })),
    }
}
