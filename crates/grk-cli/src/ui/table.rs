//! Table rendering for CLI output using comfy-table.
//!
//! | Command | Table Function |
//! |---------|----------------|
//! | `grk scans` | `render_scans_table()` |
//! | `grk retrieve` | `render_retrieval_table()` |
//! | `grk ask` | `render_audit_table()` |

use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, ColumnConstraint, Table, Width};
use grk_core::{AuditEntry, RetrievedChunk, ScanMeta};

use super::format::{format_relative_time, format_thousands, truncate_str};

/// Render the scan history, newest first.
///
/// ```text
///   SCAN ID                    CREATED      FILES   CHUNKS   PARENT
/// * 20260301T101500123Z-a1b2   just now        38      142   20260301T...
///   20260301T091200456Z-c3d4   1h ago          37      139   -
/// ```
pub fn render_scans_table(scans: &[ScanMeta], current: Option<&str>) -> String {
    if scans.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new(""),
        Cell::new("SCAN ID"),
        Cell::new("CREATED"),
        Cell::new("FILES").set_alignment(CellAlignment::Right),
        Cell::new("CHUNKS").set_alignment(CellAlignment::Right),
        Cell::new("PARENT"),
    ]);

    table.set_constraints(vec![
        ColumnConstraint::LowerBoundary(Width::Fixed(1)),  // marker
        ColumnConstraint::LowerBoundary(Width::Fixed(20)), // SCAN ID
        ColumnConstraint::LowerBoundary(Width::Fixed(10)), // CREATED
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),  // FILES
        ColumnConstraint::LowerBoundary(Width::Fixed(7)),  // CHUNKS
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),  // PARENT
    ]);

    for scan in scans {
        let marker = if current == Some(scan.scan_id.as_str()) {
            "*"
        } else {
            ""
        };
        let parent = scan
            .parent_scan
            .as_deref()
            .map(|p| truncate_str(p, 24))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&scan.scan_id),
            Cell::new(format_relative_time(scan.created_at)),
            Cell::new(format_thousands(scan.stats.file_count)).set_alignment(CellAlignment::Right),
            Cell::new(format_thousands(scan.stats.chunk_count)).set_alignment(CellAlignment::Right),
            Cell::new(parent),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render retrieved chunks with their scores and matched signals.
///
/// ```text
/// #   LOCATION                                  SCORE   SIGNALS
/// 1   app/Auth/LoginController.php:L1-40         9.50   symbol:LoginController
/// ```
pub fn render_retrieval_table(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("#").set_alignment(CellAlignment::Right),
        Cell::new("LOCATION"),
        Cell::new("SCORE").set_alignment(CellAlignment::Right),
        Cell::new("SIGNALS"),
    ]);

    for (i, retrieved) in chunks.iter().enumerate() {
        let signals = retrieved
            .signals
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let location = if retrieved.redacted {
            format!("{} (redacted)", retrieved.location())
        } else {
            retrieved.location()
        };

        table.add_row(vec![
            Cell::new(i + 1).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&location, 60)),
            Cell::new(format!("{:.2}", retrieved.score)).set_alignment(CellAlignment::Right),
            Cell::new(truncate_str(&signals, 60)),
        ]);
    }

    table.trim_fmt().to_string()
}

/// Render the per-chunk audit of an answer.
///
/// ```text
/// LOCATION                                  RELEVANCE   USED   SNIPPETS
/// app/Auth/LoginController.php:L1-40             0.92   yes           2
/// ```
pub fn render_audit_table(audit: &[AuditEntry]) -> String {
    if audit.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(NOTHING);

    table.set_header(vec![
        Cell::new("LOCATION"),
        Cell::new("RELEVANCE").set_alignment(CellAlignment::Right),
        Cell::new("USED"),
        Cell::new("SNIPPETS").set_alignment(CellAlignment::Right),
    ]);

    for entry in audit {
        let location = format!("{}:L{}-{}", entry.path, entry.start_line, entry.end_line);
        table.add_row(vec![
            Cell::new(truncate_str(&location, 60)),
            Cell::new(format!("{:.2}", entry.relevance)).set_alignment(CellAlignment::Right),
            Cell::new(if entry.referenced { "yes" } else { "no" }),
            Cell::new(entry.snippets.len()).set_alignment(CellAlignment::Right),
        ]);
    }

    table.trim_fmt().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use grk_core::ScanStats;

    fn scan(id: &str, parent: Option<&str>) -> ScanMeta {
        ScanMeta {
            schema_version: 1,
            scan_id: id.to_string(),
            project: "demo".to_string(),
            head_commit: None,
            created_at: Utc::now(),
            parent_scan: parent.map(String::from),
            file_index_format: Default::default(),
            stats: ScanStats {
                file_count: 1200,
                chunk_count: 42,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(render_scans_table(&[], None).is_empty());
        assert!(render_retrieval_table(&[]).is_empty());
        assert!(render_audit_table(&[]).is_empty());
    }

    #[test]
    fn test_scans_table_marks_current() {
        let scans = vec![scan("scan-b", Some("scan-a")), scan("scan-a", None)];
        let output = render_scans_table(&scans, Some("scan-b"));

        assert!(output.contains("SCAN ID"));
        assert!(output.contains("1,200"));
        let current_line = output.lines().find(|l| l.contains("scan-b")).unwrap_or_default();
        assert!(current_line.trim_start().starts_with('*'));
        let old_line = output
            .lines()
            .find(|l| l.trim_start().starts_with("scan-a"))
            .unwrap_or_default();
        assert!(old_line.ends_with('-'));
    }
}
