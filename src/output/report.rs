//! End-of-run crawl report

use crate::state::CrawlPhase;
use crate::storage::RunSummary;
use std::time::Duration;

/// Outcome counts for one crawl run
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    /// Pages actually requested
    pub fetched: usize,

    /// Documents handed to the index sink
    pub indexed: usize,

    pub skipped_disallowed: usize,
    pub skipped_fetch_error: usize,
    pub skipped_non_html: usize,
    pub skipped_duplicate: usize,
    pub skipped_low_value: usize,

    /// Documents the search engine accepted
    pub documents_delivered: usize,

    /// Batches dropped after exhausting retries
    pub batches_failed: usize,

    /// Documents lost with those batches
    pub documents_dropped: usize,

    pub final_state: CrawlPhase,

    /// The run stopped early on cancellation or deadline
    pub cancelled: bool,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Total pages skipped for any reason
    pub fn skipped(&self) -> usize {
        self.skipped_disallowed
            + self.skipped_fetch_error
            + self.skipped_non_html
            + self.skipped_duplicate
            + self.skipped_low_value
    }

    /// Whether every indexed document reached the engine
    pub fn fully_delivered(&self) -> bool {
        self.batches_failed == 0 && self.documents_delivered == self.indexed
    }

    /// Counters stored in the run history
    pub fn run_summary(&self) -> RunSummary {
        RunSummary {
            pages_fetched: self.fetched as u64,
            documents_indexed: self.documents_delivered as u64,
            documents_skipped: self.skipped() as u64,
            documents_dropped: self.documents_dropped as u64,
        }
    }
}

/// Renders the report as human-readable text
pub fn format_report(report: &CrawlReport) -> String {
    let mut lines = vec![
        "=== Crawl Report ===".to_string(),
        String::new(),
        format!("State: {}", report.final_state),
    ];
    if report.cancelled {
        lines.push("Stopped early: cancelled or deadline reached".to_string());
    }
    lines.push(format!("Elapsed: {:.1}s", report.elapsed.as_secs_f64()));
    lines.push(String::new());

    lines.push("Pages:".to_string());
    lines.push(format!("  Fetched: {}", report.fetched));
    lines.push(format!("  Indexed: {}", report.indexed));
    lines.push(format!("  Skipped: {}", report.skipped()));

    let skips = [
        ("Disallowed by robots.txt", report.skipped_disallowed),
        ("Fetch errors", report.skipped_fetch_error),
        ("Non-HTML", report.skipped_non_html),
        ("Duplicate content", report.skipped_duplicate),
        ("Low value", report.skipped_low_value),
    ];
    for (label, count) in skips.iter().filter(|(_, count)| *count > 0) {
        lines.push(format!("    {}: {}", label, count));
    }
    lines.push(String::new());

    lines.push("Delivery:".to_string());
    lines.push(format!("  Documents delivered: {}", report.documents_delivered));
    if report.batches_failed > 0 {
        lines.push(format!(
            "  Failed batches: {} ({} documents dropped)",
            report.batches_failed, report.documents_dropped
        ));
    }

    let rate = if report.elapsed.as_secs_f64() > 0.0 {
        report.fetched as f64 / report.elapsed.as_secs_f64()
    } else {
        0.0
    };
    lines.push(String::new());
    lines.push(format!("Throughput: {:.2} pages/sec", rate));

    lines.join("\n")
}

/// Prints the report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("{}", format_report(report));
}
