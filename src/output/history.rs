//! Run history and search result listings

use crate::index::SearchHit;
use crate::storage::RunRecord;

/// Renders recent runs, newest first
pub fn format_run_history(runs: &[RunRecord]) -> String {
    if runs.is_empty() {
        return "No crawl runs recorded.".to_string();
    }

    let mut lines = vec!["=== Crawl History ===".to_string(), String::new()];
    for run in runs {
        let finished = run
            .finished_at
            .as_deref()
            .map(|f| format!(", finished {}", f))
            .unwrap_or_default();
        lines.push(format!(
            "#{} {} [{}] started {}{}",
            run.id,
            run.config_hash.get(..12).unwrap_or(&run.config_hash),
            run.status,
            run.started_at,
            finished
        ));
        if run.is_finished() {
            lines.push(format!(
                "    fetched {}, indexed {}, skipped {}, dropped {}",
                run.summary.pages_fetched,
                run.summary.documents_indexed,
                run.summary.documents_skipped,
                run.summary.documents_dropped
            ));
        } else {
            lines.push("    still running".to_string());
        }
    }
    lines.join("\n")
}

pub fn print_run_history(runs: &[RunRecord]) {
    println!("{}", format_run_history(runs));
}

/// Renders ranked search hits as `score  title  url  id` lines
pub fn format_search_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results.".to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{:>3}. [{:.3}] {}\n     {}\n     id: {}",
                i + 1,
                hit.score,
                hit.title,
                hit.url,
                hit.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn print_search_hits(hits: &[SearchHit]) {
    println!("{}", format_search_hits(hits));
}
