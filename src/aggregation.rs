//! Aggregation module for summarizing session populations
//!
//! Three views over the same canonical sessions:
//! - daily-by-model groups (calendar date × model),
//! - rolling 5-hour usage blocks for rate-limit style reporting,
//! - the ungrouped per-session view.
//!
//! Every view sums the token, cost, time and prompt figures of its
//! constituent sessions exactly — no double counting, no loss — and each
//! has a dedicated [`Summary`] constructor so the fold never has to sniff
//! which shape it was handed.
//!
//! Sessions are expected to arrive with `cost` and `total_tokens` already
//! attached by the cost calculator; groups sum the per-session cost rather
//! than re-pricing summed tokens.

use crate::stats::basic_stats;
use crate::types::{Session, TokenCounts};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Group key for sessions that carry no parsable start time
pub const UNKNOWN_DATE_KEY: &str = "Unknown Date";

/// Length of one usage block
const BLOCK_HOURS: i64 = 5;

/// Usage for one calendar date and model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyModelUsage {
    /// ISO date (`YYYY-MM-DD`), or [`UNKNOWN_DATE_KEY`]
    pub date: String,
    /// Normalized model name
    pub model: String,
    /// Provider of the first constituent session
    pub provider: String,
    /// Summed token counts
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Summed billable tokens
    pub total_tokens: i64,
    /// Summed genuine user prompts
    pub user_interactions: u64,
    /// Summed USD cost
    pub cost: f64,
    /// Constituent sessions
    pub sessions: Vec<Session>,
}

/// One rolling 5-hour usage window
///
/// Windows are anchored at the earliest dated session of the filtered
/// population, not calendar-aligned. Several models can share a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBlock {
    /// Window start (inclusive)
    pub start: DateTime<Utc>,
    /// Window end (exclusive)
    pub end: DateTime<Utc>,
    /// ISO date of the window start
    pub date: String,
    /// `HH:MM - HH:MM` display range
    pub time_range: String,
    /// Distinct models in the window, sorted and comma-joined
    pub models: String,
    /// Summed token counts
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Summed billable tokens
    pub total_tokens: i64,
    /// Summed genuine user prompts
    pub user_prompts: u64,
    /// Summed USD cost
    pub cost: f64,
    /// Constituent sessions
    pub sessions: Vec<Session>,
}

/// Totals folded over any aggregation view
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of sessions
    pub total_sessions: usize,
    /// Billable tokens
    pub total_tokens: i64,
    /// USD cost
    pub total_cost: f64,
    /// Assistant-active milliseconds
    pub total_active_time: i64,
    /// Genuine user prompts
    pub total_prompts: u64,
}

impl Summary {
    /// Fold daily-by-model groups
    pub fn from_daily(groups: &[DailyModelUsage]) -> Self {
        let mut summary = Self::default();
        for group in groups {
            summary.total_tokens += group.total_tokens;
            summary.total_cost += group.cost;
            summary.total_sessions += group.sessions.len();
            summary.total_active_time +=
                group.sessions.iter().map(|s| s.active_time_ms).sum::<i64>();
            summary.total_prompts += group.user_interactions;
        }
        summary
    }

    /// Fold usage blocks
    pub fn from_blocks(blocks: &[UsageBlock]) -> Self {
        let mut summary = Self::default();
        for block in blocks {
            summary.total_tokens += block.total_tokens;
            summary.total_cost += block.cost;
            summary.total_sessions += block.sessions.len();
            summary.total_active_time +=
                block.sessions.iter().map(|s| s.active_time_ms).sum::<i64>();
            summary.total_prompts += block.user_prompts;
        }
        summary
    }

    /// Fold bare sessions
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut summary = Self::default();
        for session in sessions {
            summary.total_tokens += session.total_tokens;
            summary.total_cost += session.cost;
            summary.total_sessions += 1;
            summary.total_active_time += session.active_time_ms;
            summary.total_prompts += session.user_interactions;
        }
        summary
    }
}

/// Accumulator for one (date, model) group
#[derive(Default)]
struct DailyAccumulator {
    provider: Option<String>,
    tokens: TokenCounts,
    total_tokens: i64,
    user_interactions: u64,
    cost: f64,
    sessions: Vec<Session>,
}

impl DailyAccumulator {
    fn add(&mut self, session: &Session) {
        if self.provider.is_none() {
            self.provider = Some(session.provider.clone());
        }
        self.tokens += session.tokens;
        self.total_tokens += session.tokens.total();
        self.user_interactions += session.user_interactions;
        self.cost += session.cost;
        self.sessions.push(session.clone());
    }
}

/// Accumulator for one 5-hour block
#[derive(Default)]
struct BlockAccumulator {
    models: BTreeSet<String>,
    tokens: TokenCounts,
    total_tokens: i64,
    user_prompts: u64,
    cost: f64,
    sessions: Vec<Session>,
}

impl BlockAccumulator {
    fn add(&mut self, session: &Session) {
        self.models.insert(session.model.clone());
        self.tokens += session.tokens;
        self.total_tokens += session.tokens.total();
        self.user_prompts += session.user_interactions;
        self.cost += session.cost;
        self.sessions.push(session.clone());
    }
}

/// Group sessions by (calendar date, model).
///
/// Undated sessions fall into the [`UNKNOWN_DATE_KEY`] bucket. Result is
/// sorted by date ascending with the unknown bucket last, then model name
/// ascending within a date.
pub fn group_by_date_and_model(sessions: &[Session]) -> Vec<DailyModelUsage> {
    let mut groups: BTreeMap<(String, String), DailyAccumulator> = BTreeMap::new();

    for session in sessions {
        let date_key = session
            .date
            .map(|d| d.date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN_DATE_KEY.to_string());
        groups
            .entry((date_key, session.model.clone()))
            .or_default()
            .add(session);
    }

    let mut result: Vec<DailyModelUsage> = groups
        .into_iter()
        .map(|((date, model), acc)| DailyModelUsage {
            date,
            model,
            provider: acc.provider.unwrap_or_default(),
            tokens: acc.tokens,
            total_tokens: acc.total_tokens,
            user_interactions: acc.user_interactions,
            cost: acc.cost,
            sessions: acc.sessions,
        })
        .collect();

    result.sort_by(|a, b| {
        match (a.date == UNKNOWN_DATE_KEY, b.date == UNKNOWN_DATE_KEY) {
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            _ => a.date.cmp(&b.date).then_with(|| a.model.cmp(&b.model)),
        }
    });
    result
}

/// Group sessions into rolling 5-hour blocks.
///
/// The window anchor is the earliest dated session's start time; a session
/// lands in block `floor(hours_since_anchor / 5)`. Undated sessions are
/// excluded entirely. Result is sorted by window start ascending.
pub fn group_into_blocks(sessions: &[Session]) -> Vec<UsageBlock> {
    let Some(anchor) = sessions.iter().filter_map(|s| s.date).min() else {
        return Vec::new();
    };

    let mut blocks: BTreeMap<i64, BlockAccumulator> = BTreeMap::new();
    for session in sessions {
        let Some(date) = session.date else {
            continue;
        };
        let index = (date - anchor).num_seconds().div_euclid(BLOCK_HOURS * 3600);
        blocks.entry(index).or_default().add(session);
    }

    blocks
        .into_iter()
        .map(|(index, acc)| {
            let start = anchor + Duration::hours(BLOCK_HOURS * index);
            let end = start + Duration::hours(BLOCK_HOURS);
            UsageBlock {
                start,
                end,
                date: start.date_naive().format("%Y-%m-%d").to_string(),
                time_range: format!("{} - {}", start.format("%H:%M"), end.format("%H:%M")),
                models: acc.models.into_iter().collect::<Vec<_>>().join(", "),
                tokens: acc.tokens,
                total_tokens: acc.total_tokens,
                user_prompts: acc.user_prompts,
                cost: acc.cost,
                sessions: acc.sessions,
            }
        })
        .collect()
}

/// Sort the per-session view: date descending, undated sessions last
pub fn sort_sessions_newest_first(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by(|a, b| match (a.date, b.date) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (Some(_), None) => std::cmp::Ordering::Less,
        (Some(a), Some(b)) => b.cmp(&a),
    });
    sessions
}

/// Daily cost timeline entry derived from dated sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCost {
    /// ISO date
    pub date: String,
    /// Summed USD cost for the date
    pub cost: f64,
}

/// Fold dated sessions into a sorted per-day cost timeline
pub fn daily_cost_timeline(sessions: &[Session]) -> Vec<DailyCost> {
    let mut per_day: BTreeMap<String, f64> = BTreeMap::new();
    for session in sessions {
        if let Some(date) = session.date {
            *per_day
                .entry(date.date_naive().format("%Y-%m-%d").to_string())
                .or_default() += session.cost;
        }
    }
    per_day
        .into_iter()
        .map(|(date, cost)| DailyCost { date, cost })
        .collect()
}

/// Statistics over the daily cost timeline
pub fn daily_cost_stats(timeline: &[DailyCost]) -> crate::stats::BasicStats {
    basic_stats(&timeline.iter().map(|d| d.cost).collect::<Vec<_>>())
}
