//! droidusage - Analyze Factory Droid AI usage data from local session files
//!
//! This library provides functionality to:
//! - Reconstruct canonical session records from per-session settings
//!   snapshots, conversation transcripts and one shared streaming log
//! - Calculate token costs against a static pricing table
//! - Aggregate sessions into daily, per-session and 5-hour block reports
//! - Rank sessions, compare periods, and run statistical analyses
//!
//! # Examples
//!
//! ```no_run
//! use droidusage::{
//!     data_loader::DataLoader,
//!     filters::DateRangeFilter,
//!     pricing::PricingTable,
//!     service::UsageService,
//! };
//!
//! #[tokio::main]
//! async fn main() -> droidusage::Result<()> {
//!     let loader = DataLoader::discover()?;
//!     let service = UsageService::new(loader, PricingTable::builtin());
//!
//!     let daily = service.daily_usage(DateRangeFilter::new()).await?;
//!     println!("{} day/model groups", daily.data.len());
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod analyzers;
pub mod batch_loader;
pub mod cli;
pub mod cost_calculator;
pub mod data_loader;
pub mod error;
pub mod filters;
pub mod format;
pub mod log_index;
pub mod orchestrator;
pub mod output;
pub mod pricing;
pub mod service;
pub mod session_reader;
pub mod stats;
pub mod top_sessions;
pub mod trends;
pub mod types;

// Re-export commonly used types
pub use error::{DroidusageError, Result};
pub use types::{normalize_model_name, Session, SessionId, TokenCounts};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
