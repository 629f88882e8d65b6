//! Output module for crawl reports and listings
//!
//! This module handles:
//! - The end-of-run crawl report
//! - Run history listings from the state database
//! - Search result listings

mod history;
mod report;

pub use history::{format_run_history, format_search_hits, print_run_history, print_search_hits};
pub use report::{format_report, print_report, CrawlReport};
