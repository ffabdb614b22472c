//! CLI interface for droidusage
//!
//! Defines the command-line surface using clap: one subcommand per report
//! (`daily` is the default when none is given) with global date-range,
//! output and directory flags.
//!
//! # Example
//!
//! ```bash
//! # Daily usage for May 2024
//! droidusage daily --since 2024-05-01 --until 2024-05-31
//!
//! # Per-session view as JSON
//! droidusage sessions --json
//!
//! # 5-hour rate-limit blocks
//! droidusage blocks
//!
//! # Ten most expensive sessions
//! droidusage top --by cost --limit 10
//!
//! # Cost analysis only
//! droidusage analyze --cost
//! ```

use crate::error::{DroidusageError, Result};
use crate::filters::DateRangeFilter;
use crate::orchestrator::AnalyzerSelection;
use crate::top_sessions::RankBy;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Analyze Factory Droid AI usage from local session files
#[derive(Parser, Debug, Clone)]
#[command(name = "droidusage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output results as JSON
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Filter sessions since this date (YYYY-MM-DD)
    #[arg(long, short = 's', global = true)]
    pub since: Option<String>,

    /// Filter sessions until this date (YYYY-MM-DD)
    #[arg(long, short = 'u', global = true)]
    pub until: Option<String>,

    /// Path to the Droid sessions directory (default: ~/.factory/sessions)
    #[arg(long, global = true, env = "DROID_SESSIONS_PATH")]
    pub sessions_dir: Option<PathBuf>,

    /// Only show warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available reports
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Daily usage grouped by date and model (default)
    Daily,
    /// Per-session usage, newest first
    Sessions,
    /// Rolling 5-hour blocks for rate limit analysis
    Blocks,
    /// Top sessions by a chosen criterion
    Top {
        /// Ranking criterion
        #[arg(long, value_enum, default_value = "cost")]
        by: RankArg,
        /// Maximum number of sessions to show (ignored for outliers)
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compare the current period against the previous one
    Trends,
    /// Run statistical analyzers over the session population
    Analyze {
        /// Run the cost analyzer
        #[arg(long)]
        cost: bool,
        /// Run the pattern analyzer
        #[arg(long)]
        patterns: bool,
        /// Run the efficiency analyzer
        #[arg(long)]
        efficiency: bool,
        /// Run every analyzer (default when no flags are given)
        #[arg(long)]
        all: bool,
    },
}

/// CLI spelling of the ranking criterion
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RankArg {
    Cost,
    Tokens,
    Duration,
    /// Worst cost-per-million-tokens first
    Efficiency,
    /// Statistical cost outliers (no limit)
    Outliers,
}

impl From<RankArg> for RankBy {
    fn from(arg: RankArg) -> Self {
        match arg {
            RankArg::Cost => RankBy::Cost,
            RankArg::Tokens => RankBy::Tokens,
            RankArg::Duration => RankBy::Duration,
            RankArg::Efficiency => RankBy::Efficiency,
            RankArg::Outliers => RankBy::Outliers,
        }
    }
}

/// Parse a `YYYY-MM-DD` date filter argument
pub fn parse_date_filter(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| DroidusageError::InvalidDate(date_str.to_string()))
}

/// Build the date range filter from the global CLI flags
pub fn build_date_range(since: Option<&str>, until: Option<&str>) -> Result<DateRangeFilter> {
    let mut range = DateRangeFilter::new();
    if let Some(since) = since {
        range = range.with_since(parse_date_filter(since)?);
    }
    if let Some(until) = until {
        range = range.with_until(parse_date_filter(until)?);
    }
    Ok(range)
}

/// Build the analyzer selection from the `analyze` flags
pub fn build_selection(cost: bool, patterns: bool, efficiency: bool, all: bool) -> AnalyzerSelection {
    AnalyzerSelection {
        cost,
        patterns,
        efficiency,
        all,
    }
}
