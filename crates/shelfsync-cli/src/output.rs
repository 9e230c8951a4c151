//! Terminal rendering for the CLI
//!
//! Commands render through the [`OutputFormatter`] seam so `--json` swaps
//! the presentation without touching command logic. The human formatter
//! writes short glyph-prefixed lines as results arrive; the JSON formatter
//! stays quiet for per-line output and emits one machine-readable document
//! at the end of the command (see [`reports_json`] / [`statuses_json`]).

use shelfsync_core::domain::TableSyncReport;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// One row of `shelfsync status` output, pre-resolved from the store.
/// `last_synced_at` is RFC 3339, or `None` when the table never synced.
pub struct TableStatus {
    pub table: String,
    pub rows: i64,
    pub last_synced_at: Option<String>,
    pub status: String,
}

pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
    /// Renders one table's sync outcome.
    fn report(&self, report: &TableSyncReport);
    /// Renders one table's local mirror state.
    fn status(&self, status: &TableStatus);
    fn print_json(&self, value: &serde_json::Value);
}

/// Streams glyph-prefixed lines; failures go to stderr.
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn report(&self, report: &TableSyncReport) {
        if report.success {
            println!(
                "\u{2713} {}: {} record(s) synced",
                report.table_name, report.records_synced
            );
        } else {
            eprintln!(
                "\u{2717} {}: {} ({} record(s) committed before the failure)",
                report.table_name,
                report.error.as_deref().unwrap_or("unknown failure"),
                report.records_synced
            );
        }
    }
    fn status(&self, status: &TableStatus) {
        let when = status.last_synced_at.as_deref().unwrap_or("never");
        println!(
            "  {}: {} row(s), last synced {}, status {}",
            status.table, status.rows, when, status.status
        );
    }
    fn print_json(&self, _value: &serde_json::Value) {}
}

/// Collects per-line output into nothing; the command's closing
/// `print_json` document carries the same data.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!(
            "{}",
            serde_json::json!({"success": true, "message": message})
        );
    }
    fn error(&self, message: &str) {
        eprintln!(
            "{}",
            serde_json::json!({"success": false, "error": message})
        );
    }
    fn info(&self, _message: &str) {}
    fn report(&self, _report: &TableSyncReport) {}
    fn status(&self, _status: &TableStatus) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        );
    }
}

/// JSON document for a sync run: one object per table report.
pub fn reports_json(reports: &[TableSyncReport]) -> serde_json::Value {
    serde_json::json!({
        "reports": reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "table": r.table_name,
                    "success": r.success,
                    "records_synced": r.records_synced,
                    "error": r.error,
                })
            })
            .collect::<Vec<_>>(),
    })
}

/// JSON document for the status command: one object per registered table.
pub fn statuses_json(statuses: &[TableStatus]) -> serde_json::Value {
    serde_json::json!({
        "tables": statuses
            .iter()
            .map(|s| {
                serde_json::json!({
                    "table": s.table,
                    "rows": s.rows,
                    "last_synced_at": s.last_synced_at,
                    "status": s.status,
                })
            })
            .collect::<Vec<_>>(),
    })
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
