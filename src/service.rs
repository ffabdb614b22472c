//! Usage service: the entry points consumed by the CLI
//!
//! One façade wires the data loader, batch session loader, cost
//! calculator, aggregators, ranker, trend comparison and analysis
//! orchestrator together. Every report goes through the same pipeline:
//! enumerate ids (the only fatal step), batch-reconstruct sessions,
//! attach cost and total tokens, date-filter, then shape the view.
//!
//! Prompt counting scans every transcript, so it is only enabled for the
//! views that report prompt counts (blocks, rankings, trends, analysis);
//! the daily and session cost views skip it.

use crate::aggregation::{
    group_by_date_and_model, group_into_blocks, sort_sessions_newest_first, DailyModelUsage,
    Summary, UsageBlock,
};
use crate::analyzers::AnalyzeOptions;
use crate::batch_loader::BatchSessionLoader;
use crate::cost_calculator::CostCalculator;
use crate::data_loader::DataLoader;
use crate::error::Result;
use crate::filters::DateRangeFilter;
use crate::orchestrator::{AnalysisOrchestrator, AnalysisReport, AnalyzerSelection};
use crate::pricing::PricingTable;
use crate::top_sessions::{RankBy, RankedSession, RankedSummary, TopSessionsRanker};
use crate::trends::{PatternSummary, TrendAnalyzer, TrendSet};
use crate::types::Session;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Daily-by-model report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<DailyModelUsage>,
    pub summary: Summary,
}

/// Per-session report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<Session>,
    pub summary: Summary,
}

/// 5-hour block report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<UsageBlock>,
    pub summary: Summary,
}

/// Top-sessions report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopReport {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub by: RankBy,
    pub data: Vec<RankedSession>,
    pub summary: RankedSummary,
}

/// Period-over-period trends report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsReport {
    pub current: Summary,
    pub previous: Summary,
    pub trends: TrendSet,
    pub patterns: PatternSummary,
    /// Last-7-day per-day cost series for sparkline rendering
    pub sparkline: Vec<f64>,
}

/// The session reconstruction and aggregation pipeline behind the CLI
pub struct UsageService {
    loader: Arc<DataLoader>,
    cost_calculator: CostCalculator,
    batch_size: Option<usize>,
    show_progress: bool,
}

impl UsageService {
    /// Create a service over a data loader and pricing table
    pub fn new(loader: DataLoader, pricing: PricingTable) -> Self {
        Self {
            loader: Arc::new(loader),
            cost_calculator: CostCalculator::new(pricing),
            batch_size: None,
            show_progress: false,
        }
    }

    /// Override the batch size used when loading sessions
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Enable progress output while loading
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Load, annotate and date-filter the session population.
    ///
    /// A directory that cannot be listed propagates as a fatal error;
    /// individual unreadable sessions are dropped by the batch loader.
    async fn load_population(
        &self,
        range: &DateRangeFilter,
        count_prompts: bool,
    ) -> Result<Vec<Session>> {
        let ids = self.loader.list_session_ids().await?;

        let mut batch = BatchSessionLoader::new(Arc::clone(&self.loader))
            .with_progress(self.show_progress);
        if let Some(batch_size) = self.batch_size {
            batch = batch.with_batch_size(batch_size);
        }

        let mut sessions = batch.load_sessions(&ids, count_prompts).await;
        for session in &mut sessions {
            session.total_tokens = session.tokens.total();
            session.cost = self.cost_calculator.calculate(session);
        }

        info!("Loaded {} of {} sessions", sessions.len(), ids.len());
        Ok(range.apply(sessions))
    }

    /// Daily usage grouped by (date, model)
    pub async fn daily_usage(&self, range: DateRangeFilter) -> Result<DailyReport> {
        let sessions = self.load_population(&range, false).await?;
        let data = group_by_date_and_model(&sessions);
        let summary = Summary::from_daily(&data);
        Ok(DailyReport {
            kind: "daily",
            data,
            summary,
        })
    }

    /// Ungrouped per-session usage, newest first
    pub async fn session_usage(&self, range: DateRangeFilter) -> Result<SessionReport> {
        let sessions = self.load_population(&range, false).await?;
        let data = sort_sessions_newest_first(sessions);
        let summary = Summary::from_sessions(&data);
        Ok(SessionReport {
            kind: "session",
            data,
            summary,
        })
    }

    /// Rolling 5-hour block usage
    pub async fn block_usage(&self, range: DateRangeFilter) -> Result<BlockReport> {
        let sessions = self.load_population(&range, true).await?;
        let data = group_into_blocks(&sessions);
        let summary = Summary::from_blocks(&data);
        Ok(BlockReport {
            kind: "blocks",
            data,
            summary,
        })
    }

    /// Top sessions by the chosen criterion
    pub async fn top_sessions(
        &self,
        range: DateRangeFilter,
        by: RankBy,
        limit: usize,
    ) -> Result<TopReport> {
        let sessions = self.load_population(&range, true).await?;
        let ranker = TopSessionsRanker;
        let data = ranker.rank(&sessions, by, limit);
        let summary = ranker.summary_stats(&data);
        Ok(TopReport {
            kind: "top",
            by,
            data,
            summary,
        })
    }

    /// Current-vs-previous period trend comparison.
    ///
    /// With no explicit range the current period is the last 7 days. The
    /// previous period has the same span, immediately preceding.
    pub async fn trends_analysis(&self, range: DateRangeFilter) -> Result<TrendsReport> {
        let today = Utc::now().date_naive();
        let current_until = range.until.unwrap_or(today);
        let current_since = range
            .since
            .unwrap_or(current_until - chrono::Duration::days(7));
        let (previous_since, previous_until) =
            TrendAnalyzer::previous_period(Some(current_since), Some(current_until), today);

        // One load covers both periods; each summary applies its own range.
        let all = self.load_population(&DateRangeFilter::new(), true).await?;

        let current_filter = DateRangeFilter::new()
            .with_since(current_since)
            .with_until(current_until);
        let previous_filter = DateRangeFilter::new()
            .with_since(previous_since)
            .with_until(previous_until);

        let current_sessions: Vec<Session> = all
            .iter()
            .filter(|s| current_filter.matches(s))
            .cloned()
            .collect();
        let previous_sessions: Vec<Session> = all
            .iter()
            .filter(|s| previous_filter.matches(s))
            .cloned()
            .collect();

        let current = Summary::from_sessions(&current_sessions);
        let previous = Summary::from_sessions(&previous_sessions);
        let trends = TrendAnalyzer.compare_periods(&current, &previous);
        let patterns = TrendAnalyzer::detect_patterns(&current_sessions);
        let sparkline =
            TrendAnalyzer::sparkline_data(&group_by_date_and_model(&current_sessions), 7);

        Ok(TrendsReport {
            current,
            previous,
            trends,
            patterns,
            sparkline,
        })
    }

    /// Run the statistical analyzers over the date-filtered population
    pub async fn run_analysis(
        &self,
        range: DateRangeFilter,
        selection: AnalyzerSelection,
    ) -> Result<AnalysisReport> {
        let sessions = self.load_population(&range, true).await?;
        Ok(AnalysisOrchestrator.run_analysis(&sessions, selection, &AnalyzeOptions::default()))
    }

    /// Distinct model names across the population, sorted
    pub async fn models(&self) -> Result<Vec<String>> {
        let sessions = self
            .load_population(&DateRangeFilter::new(), false)
            .await?;
        let models: BTreeSet<String> = sessions.into_iter().map(|s| s.model).collect();
        Ok(models.into_iter().collect())
    }

    /// Distinct provider names across the population, sorted
    pub async fn providers(&self) -> Result<Vec<String>> {
        let sessions = self
            .load_population(&DateRangeFilter::new(), false)
            .await?;
        let providers: BTreeSet<String> = sessions.into_iter().map(|s| s.provider).collect();
        Ok(providers.into_iter().collect())
    }
}
