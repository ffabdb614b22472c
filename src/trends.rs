//! Trend analysis: current period compared with the immediately preceding
//! period of the same length
//!
//! Seven metrics are compared. Percentage change is strictly thresholded:
//! a move must exceed +5% to read as "up" and fall below -5% to read as
//! "down"; exactly ±5% is still "stable". A previous period with zero
//! sessions produces a degenerate trend that reports only current values
//! with every direction stable — no division happens against an empty
//! baseline.

use crate::aggregation::{DailyModelUsage, Summary};
use crate::types::Session;
use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a metric's movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    /// Strictly greater than +5% is up, strictly less than -5% is down
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage > 5.0 {
            Self::Up
        } else if percentage < -5.0 {
            Self::Down
        } else {
            Self::Stable
        }
    }

    /// Arrow indicator for terminal display
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Up => "↑",
            Self::Down => "↓",
            Self::Stable => "→",
        }
    }
}

/// One metric's movement between periods
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    /// Current period value
    pub value: f64,
    /// Previous period value
    pub previous: f64,
    /// Absolute change
    pub change: f64,
    /// Percentage change ((current - previous) / previous × 100)
    pub percentage: f64,
    pub direction: TrendDirection,
    /// Arrow for display
    pub indicator: String,
}

/// All compared metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSet {
    pub cost: MetricTrend,
    pub tokens: MetricTrend,
    pub sessions: MetricTrend,
    pub prompts: MetricTrend,
    pub avg_cost_per_session: MetricTrend,
    pub avg_tokens_per_session: MetricTrend,
    pub avg_cost_per_prompt: MetricTrend,
}

/// Compact usage pattern summary attached to the trends report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub peak_hour: u32,
    pub peak_hour_range: String,
    pub peak_day: String,
    /// 24 per-hour session counts
    pub hourly_distribution: Vec<usize>,
    /// 7 per-weekday session counts, Sunday first
    pub daily_distribution: Vec<usize>,
}

/// Compares usage summaries across periods
#[derive(Debug, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Compare a current-period summary against the previous period.
    ///
    /// A previous period with no sessions yields the degenerate
    /// all-stable trend.
    pub fn compare_periods(&self, current: &Summary, previous: &Summary) -> TrendSet {
        if previous.total_sessions == 0 {
            return Self::degenerate_trend(current);
        }

        let current_sessions = current.total_sessions as f64;
        let previous_sessions = previous.total_sessions as f64;

        TrendSet {
            cost: Self::calculate_change(current.total_cost, previous.total_cost),
            tokens: Self::calculate_change(
                current.total_tokens as f64,
                previous.total_tokens as f64,
            ),
            sessions: Self::calculate_change(current_sessions, previous_sessions),
            prompts: Self::calculate_change(
                current.total_prompts as f64,
                previous.total_prompts as f64,
            ),
            avg_cost_per_session: Self::calculate_change(
                safe_div(current.total_cost, current_sessions),
                previous.total_cost / previous_sessions,
            ),
            avg_tokens_per_session: Self::calculate_change(
                safe_div(current.total_tokens as f64, current_sessions),
                previous.total_tokens as f64 / previous_sessions,
            ),
            avg_cost_per_prompt: Self::calculate_change(
                safe_div(current.total_cost, current.total_prompts.max(1) as f64),
                previous.total_cost / previous.total_prompts.max(1) as f64,
            ),
        }
    }

    /// Change of one metric with direction classification
    pub fn calculate_change(current: f64, previous: f64) -> MetricTrend {
        if previous == 0.0 {
            return MetricTrend {
                value: current,
                previous,
                change: 0.0,
                percentage: 0.0,
                direction: TrendDirection::Stable,
                indicator: TrendDirection::Stable.indicator().to_string(),
            };
        }

        let change = current - previous;
        let percentage = change / previous * 100.0;
        let direction = TrendDirection::from_percentage(percentage);

        MetricTrend {
            value: current,
            previous,
            change,
            percentage,
            direction,
            indicator: direction.indicator().to_string(),
        }
    }

    fn degenerate_trend(current: &Summary) -> TrendSet {
        let stable = |value: f64| MetricTrend {
            value,
            previous: 0.0,
            change: 0.0,
            percentage: 0.0,
            direction: TrendDirection::Stable,
            indicator: TrendDirection::Stable.indicator().to_string(),
        };
        let sessions = current.total_sessions as f64;

        TrendSet {
            cost: stable(current.total_cost),
            tokens: stable(current.total_tokens as f64),
            sessions: stable(sessions),
            prompts: stable(current.total_prompts as f64),
            avg_cost_per_session: stable(safe_div(current.total_cost, sessions)),
            avg_tokens_per_session: stable(safe_div(current.total_tokens as f64, sessions)),
            avg_cost_per_prompt: stable(safe_div(
                current.total_cost,
                current.total_prompts.max(1) as f64,
            )),
        }
    }

    /// Date range of the previous period: the same span length immediately
    /// preceding the current range. With no explicit range the current
    /// period defaults to the last 7 days ending at `today`.
    pub fn previous_period(
        since: Option<NaiveDate>,
        until: Option<NaiveDate>,
        today: NaiveDate,
    ) -> (NaiveDate, NaiveDate) {
        let until = until.unwrap_or(today);
        let since = since.unwrap_or(until - Duration::days(7));
        let span_days = (until - since).num_days().max(1);

        (since - Duration::days(span_days), until - Duration::days(span_days))
    }

    /// Per-day cost series for the last `days` days, oldest first (for
    /// sparkline rendering)
    pub fn sparkline_data(daily: &[DailyModelUsage], days: usize) -> Vec<f64> {
        let mut per_day: BTreeMap<String, f64> = BTreeMap::new();
        for group in daily {
            *per_day.entry(group.date.clone()).or_default() += group.cost;
        }
        let costs: Vec<f64> = per_day.into_values().collect();
        let skip = costs.len().saturating_sub(days);
        costs.into_iter().skip(skip).collect()
    }

    /// Compact hour/weekday pattern summary over dated sessions
    pub fn detect_patterns(sessions: &[Session]) -> PatternSummary {
        let mut hourly = vec![0usize; 24];
        let mut daily = vec![0usize; 7];

        for session in sessions {
            if let Some(date) = session.date {
                hourly[date.hour() as usize] += 1;
                daily[date.weekday().num_days_from_sunday() as usize] += 1;
            }
        }

        let peak_hour = (0..24).max_by_key(|&h| hourly[h]).unwrap_or(0) as u32;
        let peak_day_index = (0..7).max_by_key(|&d| daily[d]).unwrap_or(0);
        let day_names = [
            "Sunday",
            "Monday",
            "Tuesday",
            "Wednesday",
            "Thursday",
            "Friday",
            "Saturday",
        ];

        PatternSummary {
            peak_hour,
            peak_hour_range: format!("{}:00-{}:00", peak_hour, (peak_hour + 1) % 24),
            peak_day: day_names[peak_day_index].to_string(),
            hourly_distribution: hourly,
            daily_distribution: daily,
        }
    }
}

fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(sessions: usize, tokens: i64, cost: f64, prompts: u64) -> Summary {
        Summary {
            total_sessions: sessions,
            total_tokens: tokens,
            total_cost: cost,
            total_active_time: 0,
            total_prompts: prompts,
        }
    }

    #[test]
    fn test_direction_boundaries_are_strict() {
        assert_eq!(
            TrendDirection::from_percentage(5.0),
            TrendDirection::Stable
        );
        assert_eq!(
            TrendDirection::from_percentage(-5.0),
            TrendDirection::Stable
        );
        assert_eq!(TrendDirection::from_percentage(6.0), TrendDirection::Up);
        assert_eq!(TrendDirection::from_percentage(-10.0), TrendDirection::Down);
        assert_eq!(TrendDirection::from_percentage(5.001), TrendDirection::Up);
    }

    #[test]
    fn test_calculate_change() {
        let trend = TrendAnalyzer::calculate_change(110.0, 100.0);
        assert_eq!(trend.change, 10.0);
        assert!((trend.percentage - 10.0).abs() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_eq!(trend.indicator, "↑");
    }

    #[test]
    fn test_zero_previous_is_stable() {
        let trend = TrendAnalyzer::calculate_change(42.0, 0.0);
        assert_eq!(trend.percentage, 0.0);
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn test_compare_periods() {
        let current = summary(20, 2_000_000, 120.0, 40);
        let previous = summary(10, 1_000_000, 100.0, 20);

        let trends = TrendAnalyzer.compare_periods(&current, &previous);
        assert_eq!(trends.sessions.direction, TrendDirection::Up);
        assert!((trends.cost.percentage - 20.0).abs() < 1e-9);
        // Cost per session dropped from 10 to 6: down 40%.
        assert_eq!(trends.avg_cost_per_session.direction, TrendDirection::Down);
        assert!((trends.avg_cost_per_session.percentage + 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_previous_period_is_degenerate() {
        let current = summary(5, 100, 10.0, 2);
        let previous = summary(0, 0, 0.0, 0);

        let trends = TrendAnalyzer.compare_periods(&current, &previous);
        assert_eq!(trends.cost.direction, TrendDirection::Stable);
        assert_eq!(trends.cost.value, 10.0);
        assert_eq!(trends.sessions.percentage, 0.0);
        assert_eq!(trends.avg_cost_per_session.value, 2.0);
    }

    #[test]
    fn test_previous_period_spans_match() {
        let since = NaiveDate::from_ymd_opt(2024, 5, 11).unwrap();
        let until = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let (prev_since, prev_until) = TrendAnalyzer::previous_period(Some(since), Some(until), today);
        assert_eq!(prev_since, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(prev_until, NaiveDate::from_ymd_opt(2024, 5, 11).unwrap());
    }

    #[test]
    fn test_previous_period_defaults_to_last_week() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let (prev_since, prev_until) = TrendAnalyzer::previous_period(None, None, today);
        assert_eq!(prev_until, NaiveDate::from_ymd_opt(2024, 6, 8).unwrap());
        assert_eq!(prev_since, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}
