//! Catalog command and report rendering
//!
//! Runs a catalog pass over the downloaded documents and renders its records,
//! the usage window and the document list as terminal tables.

use crate::agent::{AnalysisResult, BatchOutcome, BatchProgress, Session, UsageTracker};
use crate::attachments::MockDocument;
use crate::config::Config;
use crate::error::{AcervoError, Result};
use crate::providers::create_provider;
use colored::Colorize;
use prettytable::{format, row, Table};

const SUMMARY_WIDTH: usize = 60;

/// Catalog every downloaded document and print the report
///
/// Progress goes to stderr so `--json` output on stdout stays parseable.
///
/// # Errors
///
/// Returns error if the provider cannot be created or the run aborts
pub async fn run_catalog(config: &Config, json: bool) -> Result<()> {
    let provider = create_provider(&config.provider.provider_type, &config.provider)?;
    let mut session = Session::new_boxed(provider, config);

    let documents: Vec<String> = session.documents().iter().map(|d| d.name.clone()).collect();
    let outcome = session
        .analyze_all(&mut |p: BatchProgress| {
            let name = documents.get(p.current - 1).map(String::as_str).unwrap_or("?");
            eprintln!("{}", format!("[{}] Processing {}...", p, name).cyan());
        })
        .await?;

    match outcome {
        BatchOutcome::Completed(records) => {
            eprintln!("{}", format!("Catalogued {} documents", records.len()).green());
            print_report(&records, json)
        }
        BatchOutcome::Aborted { processed, error } => {
            eprintln!(
                "{}",
                format!("Cataloguing stopped after {} documents", processed).red()
            );
            Err(error)
        }
    }
}

/// Print catalog records as a table, or as pretty JSON
pub fn print_report(records: &[AnalysisResult], json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(records).map_err(AcervoError::Serialization)?;
        println!("{}", rendered);
        return Ok(());
    }

    if records.is_empty() {
        println!(
            "{}",
            "The catalog is empty. Run /catalog to catalog the downloaded documents.".yellow()
        );
        return Ok(());
    }

    println!("\nCatalog Report:");
    report_table(records).printstd();
    println!();
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn report_table(records: &[AnalysisResult]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "Type".bold(),
        "Summary".bold(),
        "Date".bold(),
        "Reference".bold(),
        "File".bold()
    ]);

    for record in records {
        table.add_row(row![
            record.doc_type.cyan(),
            truncate(&record.summary, SUMMARY_WIDTH),
            record.access_date,
            record.reference,
            record.source_name
        ]);
    }

    table
}

/// Print the usage window with its totals
pub fn print_usage(usage: &UsageTracker) {
    if usage.is_empty() {
        println!("{}", "No completed turns yet.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["Time".bold(), "Model".bold(), "Tokens".bold(), "Latency".bold()]);
    for stat in usage.snapshot() {
        table.add_row(row![
            stat.label,
            stat.model.as_deref().unwrap_or("-"),
            stat.tokens,
            format!("{} ms", stat.latency.as_millis())
        ]);
    }

    println!("\nUsage (last {} of {} turns kept):", usage.len(), usage.capacity());
    table.printstd();
    let average = usage
        .average_latency()
        .map(|d| format!("{} ms", d.as_millis()))
        .unwrap_or_else(|| "-".to_string());
    println!("Total tokens: {}  Average latency: {}\n", usage.total_tokens(), average);
}

/// Print the documents available for cataloguing
pub fn print_documents(documents: &[MockDocument]) {
    if documents.is_empty() {
        println!("{}", "No downloaded documents.".yellow());
        return;
    }

    println!("\nDownloaded documents:");
    for document in documents {
        println!(
            "  {} ({} chars)",
            document.name.cyan(),
            document.content.chars().count()
        );
    }
    println!();
}

/// Render the report of `session`
pub fn print_session_report(session: &Session, json: bool) -> Result<()> {
    print_report(&session.catalog_report(), json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, summary: &str) -> AnalysisResult {
        AnalysisResult {
            doc_type: "Article".to_string(),
            summary: summary.to_string(),
            access_date: "01/01/2024".to_string(),
            reference: "Law".to_string(),
            source_name: name.to_string(),
        }
    }

    #[test]
    fn test_truncate_long_summary() {
        let long = "a".repeat(80);
        let short = truncate(&long, 20);
        assert_eq!(short.chars().count(), 20);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short", 20), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "ação".repeat(10);
        let short = truncate(&text, 7);
        assert_eq!(short, "ação...");
    }

    #[test]
    fn test_report_table_has_row_per_record() {
        let records = vec![record("a.pdf", "x"), record("b.pdf", "y")];
        let table = report_table(&records);
        assert_eq!(table.len(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("a.pdf"));
        assert!(rendered.contains("b.pdf"));
    }

    #[test]
    fn test_report_json_uses_catalog_field_names() {
        let records = vec![record("a.pdf", "x")];
        let json = serde_json::to_string_pretty(&records).unwrap();
        assert!(json.contains("\"tipo\": \"Article\""));
        assert!(json.contains("\"nome_original\": \"a.pdf\""));
    }

    #[test]
    fn test_print_report_empty_is_ok() {
        assert!(print_report(&[], false).is_ok());
        assert!(print_report(&[], true).is_ok());
    }
}
