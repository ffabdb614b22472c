//! Statistical analyzers over the session population
//!
//! Three independent analyzers share one contract: [`Analyzer::analyze`]
//! turns a session population into a typed report, and
//! [`Analyzer::generate_insights`] reads that report back into
//! human-facing [`Insight`]s. Every analyzer is a pure function of its
//! input and rejects an empty population explicitly; shared helpers (date
//! filtering, descriptive statistics, display formatting) live in their
//! own modules rather than in any analyzer.
//!
//! - [`CostAnalyzer`] — spend grouped by model/provider, burn-rate
//!   projections, approximate cost breakdown by token type, daily cost
//!   timeline.
//! - [`PatternAnalyzer`] — hourly/weekday histograms, session duration
//!   bands and anomalies, model preference by time of day, usage spikes.
//! - [`EfficiencyAnalyzer`] — cost per million tokens and per prompt,
//!   cache utilization, per-session efficiency scores and value leaders.

use crate::error::{DroidusageError, Result};
use crate::filters::DateRangeFilter;
use crate::format::{format_cost, format_percentage};
use crate::aggregation::{daily_cost_stats, daily_cost_timeline, DailyCost};
use crate::stats::{basic_stats, mean, BasicStats};
use crate::types::{Session, SessionId};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options shared by every analyzer
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyzeOptions {
    /// Optional date range re-applied before analysis
    pub range: DateRangeFilter,
}

/// Insight classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    /// Something is likely costing money or time
    Warning,
    /// Neutral observation
    Info,
    /// Likely saving available
    Opportunity,
    /// A strength worth keeping
    Success,
    /// Relationship between two analyses
    Correlation,
}

/// Insight severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// One human-facing observation derived from an analysis report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Classification
    #[serde(rename = "type")]
    pub kind: InsightKind,
    /// Stable category slug (e.g. `burn_rate`)
    pub category: String,
    /// Display message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Suggested follow-up
    pub recommendation: String,
}

/// Actionable recommendation emitted by the efficiency analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Stable category slug
    pub category: String,
    /// `high` / `medium` / `low`
    pub priority: Severity,
    /// Display message
    pub message: String,
    /// Concrete action
    pub action: String,
    /// Rough savings estimate
    pub estimated_savings: String,
}

/// Contract shared by the statistical analyzers
pub trait Analyzer {
    /// Typed analysis result
    type Report;

    /// Stable analyzer name used in orchestration output
    fn name(&self) -> &'static str;

    /// Run the analysis over a (date-filtered) session population
    fn analyze(&self, sessions: &[Session], options: &AnalyzeOptions) -> Result<Self::Report>;

    /// Derive human-facing insights from a report
    fn generate_insights(&self, report: &Self::Report) -> Vec<Insight>;
}

/// Reject unusable populations before any analysis runs
fn validate_sessions(sessions: &[Session]) -> Result<()> {
    if sessions.is_empty() {
        return Err(DroidusageError::Analysis(
            "session population is empty".to_string(),
        ));
    }
    Ok(())
}

fn filtered<'s>(sessions: &'s [Session], options: &AnalyzeOptions) -> Vec<&'s Session> {
    sessions
        .iter()
        .filter(|s| options.range.matches(s))
        .collect()
}

// ---------------------------------------------------------------------------
// Cost analysis
// ---------------------------------------------------------------------------

/// Spend for one model across the population
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCostGroup {
    pub model: String,
    pub sessions: usize,
    pub total_cost: f64,
    pub total_tokens: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
}

/// Spend for one provider across the population
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCostGroup {
    pub provider: String,
    /// Distinct models routed through the provider, sorted
    pub models: Vec<String>,
    pub sessions: usize,
    pub total_cost: f64,
    pub total_tokens: i64,
}

/// Per-session averages
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAverages {
    pub avg_cost_per_session: f64,
    pub avg_tokens_per_session: f64,
    /// USD per one million tokens
    pub avg_cost_per_million_tokens: f64,
    pub avg_cost_per_prompt: f64,
    pub avg_duration_ms: f64,
}

/// Observed daily spend projected forward
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnRate {
    pub daily_average: f64,
    pub weekly_projection: f64,
    pub monthly_projection: f64,
    pub annual_projection: f64,
    /// Inclusive day count between earliest and latest dated session
    pub days_analyzed: i64,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

/// Approximate cost split by token type.
///
/// Each session's cost is allocated proportionally to its token-type
/// ratios. Cross-type rates differ, so this is an approximation, not exact
/// per-type pricing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub cache_read_cost: f64,
    pub cache_write_cost: f64,
    pub total: f64,
}

/// Daily cost timeline with its distribution statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostTimeline {
    pub timeline: Vec<DailyCost>,
    pub stats: BasicStats,
}

/// Full cost analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostReport {
    /// Models sorted by total cost descending
    pub by_model: Vec<ModelCostGroup>,
    /// Providers sorted by total cost descending
    pub by_provider: Vec<ProviderCostGroup>,
    pub averages: CostAverages,
    pub burn_rate: BurnRate,
    pub breakdown: CostBreakdown,
    pub trends: CostTimeline,
}

/// Analyzes spending patterns and burn rate
#[derive(Debug, Default)]
pub struct CostAnalyzer;

impl CostAnalyzer {
    fn group_by_model(sessions: &[&Session]) -> Vec<ModelCostGroup> {
        let mut groups: BTreeMap<String, ModelCostGroup> = BTreeMap::new();
        for session in sessions {
            let group = groups
                .entry(session.model.clone())
                .or_insert_with(|| ModelCostGroup {
                    model: session.model.clone(),
                    sessions: 0,
                    total_cost: 0.0,
                    total_tokens: 0,
                    input_tokens: 0,
                    output_tokens: 0,
                    cache_read_tokens: 0,
                    cache_creation_tokens: 0,
                });
            group.sessions += 1;
            group.total_cost += session.cost;
            group.total_tokens += session.total_tokens;
            group.input_tokens += session.tokens.input_tokens;
            group.output_tokens += session.tokens.output_tokens;
            group.cache_read_tokens += session.tokens.cache_read_tokens;
            group.cache_creation_tokens += session.tokens.cache_creation_tokens;
        }

        let mut result: Vec<_> = groups.into_values().collect();
        result.sort_by(|a, b| {
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result
    }

    fn group_by_provider(sessions: &[&Session]) -> Vec<ProviderCostGroup> {
        let mut groups: BTreeMap<String, (ProviderCostGroup, std::collections::BTreeSet<String>)> =
            BTreeMap::new();
        for session in sessions {
            let (group, models) = groups
                .entry(session.provider.clone())
                .or_insert_with(|| {
                    (
                        ProviderCostGroup {
                            provider: session.provider.clone(),
                            models: Vec::new(),
                            sessions: 0,
                            total_cost: 0.0,
                            total_tokens: 0,
                        },
                        std::collections::BTreeSet::new(),
                    )
                });
            models.insert(session.model.clone());
            group.sessions += 1;
            group.total_cost += session.cost;
            group.total_tokens += session.total_tokens;
        }

        let mut result: Vec<_> = groups
            .into_values()
            .map(|(mut group, models)| {
                group.models = models.into_iter().collect();
                group
            })
            .collect();
        result.sort_by(|a, b| {
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        result
    }

    fn averages(sessions: &[&Session]) -> CostAverages {
        if sessions.is_empty() {
            return CostAverages::default();
        }

        let total_cost: f64 = sessions.iter().map(|s| s.cost).sum();
        let total_tokens: i64 = sessions.iter().map(|s| s.total_tokens).sum();
        let total_prompts: u64 = sessions.iter().map(|s| s.user_interactions).sum();
        let total_duration: i64 = sessions.iter().map(|s| s.active_time_ms).sum();
        let count = sessions.len() as f64;

        CostAverages {
            avg_cost_per_session: total_cost / count,
            avg_tokens_per_session: total_tokens as f64 / count,
            avg_cost_per_million_tokens: if total_tokens > 0 {
                total_cost / total_tokens as f64 * 1_000_000.0
            } else {
                0.0
            },
            avg_cost_per_prompt: if total_prompts > 0 {
                total_cost / total_prompts as f64
            } else {
                0.0
            },
            avg_duration_ms: total_duration as f64 / count,
        }
    }

    fn burn_rate(sessions: &[&Session]) -> BurnRate {
        let dates: Vec<_> = sessions.iter().filter_map(|s| s.date).collect();
        let (Some(&min), Some(&max)) = (dates.iter().min(), dates.iter().max()) else {
            return BurnRate::default();
        };

        let span_seconds = (max - min).num_seconds().max(0) as f64;
        let days_analyzed = (span_seconds / 86_400.0).ceil() as i64 + 1;
        let total_cost: f64 = sessions.iter().map(|s| s.cost).sum();
        let daily_average = total_cost / days_analyzed as f64;

        BurnRate {
            daily_average,
            weekly_projection: daily_average * 7.0,
            monthly_projection: daily_average * 30.0,
            annual_projection: daily_average * 365.0,
            days_analyzed,
            period_start: Some(min.date_naive().format("%Y-%m-%d").to_string()),
            period_end: Some(max.date_naive().format("%Y-%m-%d").to_string()),
        }
    }

    fn breakdown(sessions: &[&Session]) -> CostBreakdown {
        let mut breakdown = CostBreakdown::default();
        for session in sessions {
            let denominator = if session.total_tokens != 0 {
                session.total_tokens as f64
            } else {
                1.0
            };
            let cost = session.cost;
            breakdown.input_cost += cost * session.tokens.input_tokens as f64 / denominator;
            breakdown.output_cost += cost * session.tokens.output_tokens as f64 / denominator;
            breakdown.cache_read_cost +=
                cost * session.tokens.cache_read_tokens as f64 / denominator;
            breakdown.cache_write_cost +=
                cost * session.tokens.cache_creation_tokens as f64 / denominator;
        }
        breakdown.total = breakdown.input_cost
            + breakdown.output_cost
            + breakdown.cache_read_cost
            + breakdown.cache_write_cost;
        breakdown
    }
}

impl Analyzer for CostAnalyzer {
    type Report = CostReport;

    fn name(&self) -> &'static str {
        "cost"
    }

    fn analyze(&self, sessions: &[Session], options: &AnalyzeOptions) -> Result<CostReport> {
        validate_sessions(sessions)?;
        let filtered = filtered(sessions, options);

        let owned: Vec<Session> = filtered.iter().map(|s| (*s).clone()).collect();
        let timeline = daily_cost_timeline(&owned);
        let stats = daily_cost_stats(&timeline);

        Ok(CostReport {
            by_model: Self::group_by_model(&filtered),
            by_provider: Self::group_by_provider(&filtered),
            averages: Self::averages(&filtered),
            burn_rate: Self::burn_rate(&filtered),
            breakdown: Self::breakdown(&filtered),
            trends: CostTimeline { timeline, stats },
        })
    }

    fn generate_insights(&self, report: &CostReport) -> Vec<Insight> {
        let mut insights = Vec::new();

        if report.burn_rate.monthly_projection > 1000.0 {
            insights.push(Insight {
                kind: InsightKind::Warning,
                category: "burn_rate".to_string(),
                message: format!(
                    "High monthly burn rate: {}",
                    format_cost(report.burn_rate.monthly_projection)
                ),
                severity: Severity::High,
                recommendation:
                    "Consider optimizing model usage or switching to cheaper models for routine tasks"
                        .to_string(),
            });
        }

        if let Some(top) = report.by_model.first() {
            let avg_cost = top.total_cost / top.sessions.max(1) as f64;
            if avg_cost > 10.0 {
                insights.push(Insight {
                    kind: InsightKind::Info,
                    category: "model_efficiency".to_string(),
                    message: format!(
                        "{} has high average cost per session: {}",
                        top.model,
                        format_cost(avg_cost)
                    ),
                    severity: Severity::Medium,
                    recommendation:
                        "Review if all sessions require this model or if cheaper alternatives could be used"
                            .to_string(),
                });
            }
        }

        let total_cache: i64 = report.by_model.iter().map(|m| m.cache_read_tokens).sum();
        let total_input: i64 = report.by_model.iter().map(|m| m.input_tokens).sum();
        let cache_rate = if total_input > 0 {
            total_cache as f64 / total_input as f64 * 100.0
        } else {
            0.0
        };
        if cache_rate < 10.0 && total_input > 1_000_000 {
            insights.push(Insight {
                kind: InsightKind::Opportunity,
                category: "cache_utilization".to_string(),
                message: format!("Low cache utilization: {}", format_percentage(cache_rate)),
                severity: Severity::Medium,
                recommendation:
                    "Enable prompt caching to reduce costs by up to 90% on repeated inputs"
                        .to_string(),
            });
        }

        if report.by_provider.len() > 1 {
            let total_cost: f64 = report.by_provider.iter().map(|p| p.total_cost).sum();
            if total_cost > 0.0 {
                let top = &report.by_provider[0];
                let concentration = top.total_cost / total_cost * 100.0;
                if concentration > 80.0 {
                    insights.push(Insight {
                        kind: InsightKind::Info,
                        category: "provider_concentration".to_string(),
                        message: format!(
                            "{:.0}% of costs from {}",
                            concentration, top.provider
                        ),
                        severity: Severity::Low,
                        recommendation:
                            "Consider diversifying providers for cost optimization and resilience"
                                .to_string(),
                    });
                }
            }
        }

        insights
    }
}

// ---------------------------------------------------------------------------
// Pattern analysis
// ---------------------------------------------------------------------------

/// Session count and cost for one hour of day
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    pub hour: u32,
    pub sessions: usize,
    pub cost: f64,
}

/// Hourly histogram and its extremes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakHours {
    /// 24 entries, hour 0..23
    pub hourly_distribution: Vec<HourBucket>,
    pub peak_hour: u32,
    pub peak_hour_range: String,
    pub peak_count: usize,
    /// Least-used hour among hours with any sessions
    pub quietest_hour: Option<u32>,
    pub total_sessions: usize,
}

/// Session count and cost for one weekday
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub day: String,
    pub day_index: u32,
    pub sessions: usize,
    pub cost: f64,
}

/// Weekday-vs-weekend split
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdaySplit {
    pub weekday: usize,
    pub weekend: usize,
    pub weekday_percentage: f64,
    pub weekend_percentage: f64,
}

/// Weekday histogram and its extremes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusiestDays {
    /// 7 entries, Sunday first
    pub daily_distribution: Vec<DayBucket>,
    pub busiest_day: String,
    pub busiest_day_index: u32,
    pub busiest_day_count: usize,
    pub quietest_day: Option<String>,
    pub weekday_vs_weekend: WeekdaySplit,
}

/// One fixed duration band
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationBucket {
    pub label: String,
    pub count: usize,
}

/// A session whose duration exceeds mean + 2σ
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationAnomaly {
    pub id: SessionId,
    pub duration_ms: i64,
    /// How many standard deviations above the mean
    pub deviation_multiple: f64,
}

/// Session duration distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationAnalysis {
    pub stats: BasicStats,
    pub distribution: Vec<DurationBucket>,
    pub anomalies: Vec<DurationAnomaly>,
}

/// Usage of one model within a time-of-day category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreference {
    pub model: String,
    pub count: usize,
    pub total_cost: f64,
    pub total_tokens: i64,
}

/// Model mix for one time-of-day category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfDayModels {
    /// Sorted by session count descending
    pub models: Vec<ModelPreference>,
    pub most_popular: Option<String>,
    pub total_sessions: usize,
}

/// Count/cost/tokens for one time-of-day category
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUsage {
    pub count: usize,
    pub cost: f64,
    pub tokens: i64,
}

/// Morning/afternoon/evening/night usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOfDayPatterns {
    pub morning: CategoryUsage,
    pub afternoon: CategoryUsage,
    pub evening: CategoryUsage,
    pub night: CategoryUsage,
    pub peak_time: String,
    pub peak_time_count: usize,
}

/// A day whose session count exceeds twice the across-days average
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpikeDay {
    pub date: String,
    pub session_count: usize,
    pub cost: f64,
    pub multiple: f64,
}

/// Usage spike detection result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSpikes {
    /// Sorted by session count descending
    pub spikes: Vec<SpikeDay>,
    pub average_daily_count: f64,
    pub threshold: f64,
    pub spike_count: usize,
}

/// Full pattern analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub peak_hours: PeakHours,
    pub busiest_days: BusiestDays,
    pub session_duration: DurationAnalysis,
    /// Keyed by time-of-day category name
    pub model_preferences: BTreeMap<String, TimeOfDayModels>,
    pub usage_spikes: UsageSpikes,
    pub time_of_day: TimeOfDayPatterns,
}

/// Analyzes temporal usage patterns and behaviors
#[derive(Debug, Default)]
pub struct PatternAnalyzer;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Time-of-day category for an hour: morning 05–12, afternoon 12–17,
/// evening 17–21, night otherwise
pub fn time_of_day_category(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

impl PatternAnalyzer {
    fn peak_hours(sessions: &[&Session]) -> PeakHours {
        let mut counts = [0usize; 24];
        let mut costs = [0.0f64; 24];
        for session in sessions {
            if let Some(date) = session.date {
                let hour = date.hour() as usize;
                counts[hour] += 1;
                costs[hour] += session.cost;
            }
        }

        let peak_hour = (0..24).max_by_key(|&h| counts[h]).unwrap_or(0) as u32;
        let quietest_hour = (0..24)
            .filter(|&h| counts[h] > 0)
            .min_by_key(|&h| counts[h])
            .map(|h| h as u32);

        PeakHours {
            hourly_distribution: (0..24)
                .map(|h| HourBucket {
                    hour: h as u32,
                    sessions: counts[h],
                    cost: costs[h],
                })
                .collect(),
            peak_hour,
            peak_hour_range: format!("{}:00-{}:00", peak_hour, (peak_hour + 1) % 24),
            peak_count: counts[peak_hour as usize],
            quietest_hour,
            total_sessions: sessions.len(),
        }
    }

    fn busiest_days(sessions: &[&Session]) -> BusiestDays {
        let mut counts = [0usize; 7];
        let mut costs = [0.0f64; 7];
        for session in sessions {
            if let Some(date) = session.date {
                let day = date.weekday().num_days_from_sunday() as usize;
                counts[day] += 1;
                costs[day] += session.cost;
            }
        }

        let busiest = (0..7).max_by_key(|&d| counts[d]).unwrap_or(0);
        let quietest = (0..7)
            .filter(|&d| counts[d] > 0)
            .min_by_key(|&d| counts[d])
            .map(|d| DAY_NAMES[d].to_string());

        let weekday: usize = counts[1..6].iter().sum();
        let weekend = counts[0] + counts[6];
        let total = weekday + weekend;

        BusiestDays {
            daily_distribution: (0..7)
                .map(|d| DayBucket {
                    day: DAY_NAMES[d].to_string(),
                    day_index: d as u32,
                    sessions: counts[d],
                    cost: costs[d],
                })
                .collect(),
            busiest_day: DAY_NAMES[busiest].to_string(),
            busiest_day_index: busiest as u32,
            busiest_day_count: counts[busiest],
            quietest_day: quietest,
            weekday_vs_weekend: WeekdaySplit {
                weekday,
                weekend,
                weekday_percentage: if total > 0 {
                    weekday as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
                weekend_percentage: if total > 0 {
                    weekend as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            },
        }
    }

    fn session_duration(sessions: &[&Session]) -> DurationAnalysis {
        let with_duration: Vec<&&Session> =
            sessions.iter().filter(|s| s.active_time_ms > 0).collect();
        let durations: Vec<f64> = with_duration
            .iter()
            .map(|s| s.active_time_ms as f64)
            .collect();
        let stats = basic_stats(&durations);

        let bands: [(&str, i64); 6] = [
            ("< 1 min", 60_000),
            ("1-5 min", 300_000),
            ("5-15 min", 900_000),
            ("15-30 min", 1_800_000),
            ("30-60 min", 3_600_000),
            ("> 60 min", i64::MAX),
        ];
        let mut distribution: Vec<DurationBucket> = bands
            .iter()
            .map(|(label, _)| DurationBucket {
                label: label.to_string(),
                count: 0,
            })
            .collect();
        for session in &with_duration {
            let slot = bands
                .iter()
                .position(|(_, max)| session.active_time_ms <= *max)
                .unwrap_or(bands.len() - 1);
            distribution[slot].count += 1;
        }

        let threshold = stats.mean + 2.0 * stats.std_dev;
        let anomalies = with_duration
            .iter()
            .filter(|s| stats.std_dev > 0.0 && (s.active_time_ms as f64) > threshold)
            .map(|s| DurationAnomaly {
                id: s.id.clone(),
                duration_ms: s.active_time_ms,
                deviation_multiple: (s.active_time_ms as f64 - stats.mean) / stats.std_dev,
            })
            .collect();

        DurationAnalysis {
            stats,
            distribution,
            anomalies,
        }
    }

    fn model_preferences(sessions: &[&Session]) -> BTreeMap<String, TimeOfDayModels> {
        let mut grouped: BTreeMap<String, BTreeMap<String, ModelPreference>> = BTreeMap::new();
        for session in sessions {
            let Some(date) = session.date else {
                continue;
            };
            let category = time_of_day_category(date.hour());
            let pref = grouped
                .entry(category.to_string())
                .or_default()
                .entry(session.model.clone())
                .or_insert_with(|| ModelPreference {
                    model: session.model.clone(),
                    count: 0,
                    total_cost: 0.0,
                    total_tokens: 0,
                });
            pref.count += 1;
            pref.total_cost += session.cost;
            pref.total_tokens += session.total_tokens;
        }

        grouped
            .into_iter()
            .map(|(category, models)| {
                let mut models: Vec<_> = models.into_values().collect();
                models.sort_by(|a, b| b.count.cmp(&a.count));
                let total_sessions = models.iter().map(|m| m.count).sum();
                let most_popular = models.first().map(|m| m.model.clone());
                (
                    category,
                    TimeOfDayModels {
                        models,
                        most_popular,
                        total_sessions,
                    },
                )
            })
            .collect()
    }

    fn time_of_day(sessions: &[&Session]) -> TimeOfDayPatterns {
        let mut patterns = TimeOfDayPatterns::default();
        for session in sessions {
            let Some(date) = session.date else {
                continue;
            };
            let bucket = match time_of_day_category(date.hour()) {
                "morning" => &mut patterns.morning,
                "afternoon" => &mut patterns.afternoon,
                "evening" => &mut patterns.evening,
                _ => &mut patterns.night,
            };
            bucket.count += 1;
            bucket.cost += session.cost;
            bucket.tokens += session.total_tokens;
        }

        let categories = [
            ("morning", patterns.morning.count),
            ("afternoon", patterns.afternoon.count),
            ("evening", patterns.evening.count),
            ("night", patterns.night.count),
        ];
        let (peak_time, peak_time_count) = categories
            .iter()
            .max_by_key(|(_, count)| *count)
            .map(|(name, count)| (name.to_string(), *count))
            .unwrap_or_else(|| ("morning".to_string(), 0));

        patterns.peak_time = peak_time;
        patterns.peak_time_count = peak_time_count;
        patterns
    }

    fn usage_spikes(sessions: &[&Session]) -> UsageSpikes {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut costs: BTreeMap<String, f64> = BTreeMap::new();
        for session in sessions {
            if let Some(date) = session.date {
                let key = date.date_naive().format("%Y-%m-%d").to_string();
                *counts.entry(key.clone()).or_default() += 1;
                *costs.entry(key).or_default() += session.cost;
            }
        }

        let average = mean(&counts.values().map(|&c| c as f64).collect::<Vec<_>>());
        let threshold = average * 2.0;

        let mut spikes: Vec<SpikeDay> = counts
            .iter()
            .filter(|&(_, &count)| count as f64 > threshold && threshold > 0.0)
            .map(|(date, &count)| SpikeDay {
                date: date.clone(),
                session_count: count,
                cost: costs.get(date).copied().unwrap_or(0.0),
                multiple: count as f64 / average,
            })
            .collect();
        spikes.sort_by(|a, b| b.session_count.cmp(&a.session_count));

        UsageSpikes {
            spike_count: spikes.len(),
            spikes,
            average_daily_count: average,
            threshold,
        }
    }
}

impl Analyzer for PatternAnalyzer {
    type Report = PatternReport;

    fn name(&self) -> &'static str {
        "patterns"
    }

    fn analyze(&self, sessions: &[Session], options: &AnalyzeOptions) -> Result<PatternReport> {
        validate_sessions(sessions)?;
        let filtered = filtered(sessions, options);

        Ok(PatternReport {
            peak_hours: Self::peak_hours(&filtered),
            busiest_days: Self::busiest_days(&filtered),
            session_duration: Self::session_duration(&filtered),
            model_preferences: Self::model_preferences(&filtered),
            usage_spikes: Self::usage_spikes(&filtered),
            time_of_day: Self::time_of_day(&filtered),
        })
    }

    fn generate_insights(&self, report: &PatternReport) -> Vec<Insight> {
        let mut insights = Vec::new();

        if report.peak_hours.peak_count > 0 {
            insights.push(Insight {
                kind: InsightKind::Info,
                category: "peak_hours".to_string(),
                message: format!(
                    "Peak usage hour: {} with {} sessions",
                    report.peak_hours.peak_hour_range, report.peak_hours.peak_count
                ),
                severity: Severity::Low,
                recommendation:
                    "Consider scheduling batch jobs outside peak hours to avoid rate limits"
                        .to_string(),
            });
        }

        let split = &report.busiest_days.weekday_vs_weekend;
        if split.weekend_percentage > 30.0 {
            insights.push(Insight {
                kind: InsightKind::Info,
                category: "weekend_usage".to_string(),
                message: format!(
                    "Significant weekend usage: {:.0}%",
                    split.weekend_percentage
                ),
                severity: Severity::Low,
                recommendation: "Weekend patterns suggest personal vs business usage mix"
                    .to_string(),
            });
        }

        let long_sessions = report.session_duration.anomalies.len();
        if long_sessions > 0 {
            insights.push(Insight {
                kind: InsightKind::Warning,
                category: "long_sessions".to_string(),
                message: format!("{long_sessions} unusually long sessions detected"),
                severity: Severity::Medium,
                recommendation:
                    "Review long-running sessions for potential inefficiencies or stuck processes"
                        .to_string(),
            });
        }

        if report.usage_spikes.spike_count > 0 {
            insights.push(Insight {
                kind: InsightKind::Info,
                category: "usage_spikes".to_string(),
                message: format!(
                    "{} usage spike days detected",
                    report.usage_spikes.spike_count
                ),
                severity: Severity::Low,
                recommendation: "Investigate spike causes to optimize future usage patterns"
                    .to_string(),
            });
        }

        insights
    }
}

// ---------------------------------------------------------------------------
// Efficiency analysis
// ---------------------------------------------------------------------------

/// Cost-per-million-tokens for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCostPerToken {
    pub model: String,
    pub sessions: usize,
    pub total_cost: f64,
    pub total_tokens: i64,
    pub cost_per_million_tokens: f64,
}

/// Ranking of models by cost per million tokens (ascending)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPerTokenReport {
    pub by_model: Vec<ModelCostPerToken>,
    pub cheapest: Option<ModelCostPerToken>,
    pub most_expensive: Option<ModelCostPerToken>,
    pub average: f64,
}

/// Cost-per-prompt for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCostPerPrompt {
    pub model: String,
    pub sessions: usize,
    pub total_cost: f64,
    pub total_prompts: u64,
    pub cost_per_prompt: f64,
}

/// Ranking of models by cost per prompt (ascending)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostPerPromptReport {
    pub by_model: Vec<ModelCostPerPrompt>,
    pub cheapest: Option<ModelCostPerPrompt>,
    pub most_expensive: Option<ModelCostPerPrompt>,
    pub average: f64,
}

/// Cache utilization for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCacheUtilization {
    pub model: String,
    pub sessions: usize,
    pub total_input: i64,
    pub total_cache_read: i64,
    pub total_cache_creation: i64,
    /// Percentage of prospective input served from cache
    pub cache_hit_rate: f64,
}

/// Population-wide cache utilization
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallCacheUtilization {
    pub hit_rate: f64,
    pub total_cache_read: i64,
    pub total_input: i64,
}

/// Cache utilization report, best performers first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheUtilizationReport {
    pub by_model: Vec<ModelCacheUtilization>,
    pub overall: OverallCacheUtilization,
    pub best_performer: Option<ModelCacheUtilization>,
    pub worst_performer: Option<ModelCacheUtilization>,
}

/// A session with its efficiency score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredSession {
    pub id: SessionId,
    pub model: String,
    pub score: f64,
    pub cost: f64,
    pub total_tokens: i64,
}

/// Efficiency score distribution and its extremes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyScores {
    pub stats: BasicStats,
    /// Highest-scoring sessions, best first
    pub top10: Vec<ScoredSession>,
    /// Lowest-scoring sessions, worst first
    pub bottom10: Vec<ScoredSession>,
}

/// Session singled out for a value metric
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueLeader {
    pub id: SessionId,
    pub model: String,
    /// Metric value: USD per million tokens, cache hit fraction, or score,
    /// depending on the list
    pub metric: f64,
}

/// Best performers on three value axes, five each
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueLeaders {
    pub best_cost_per_token: Vec<ValueLeader>,
    pub best_cache_utilization: Vec<ValueLeader>,
    pub most_efficient: Vec<ValueLeader>,
}

/// Full efficiency analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyReport {
    pub cost_per_token: CostPerTokenReport,
    pub cost_per_prompt: CostPerPromptReport,
    pub cache_utilization: CacheUtilizationReport,
    pub efficiency_scores: EfficiencyScores,
    pub value_leaders: ValueLeaders,
    pub recommendations: Vec<Recommendation>,
}

/// Analyzes cost efficiency and value
#[derive(Debug, Default)]
pub struct EfficiencyAnalyzer;

/// Efficiency score for a single session, 0–100.
///
/// Base efficiency is output tokens per dollar (cost floored at $0.0001 to
/// avoid division by zero), boosted by up to 50% for cache utilization,
/// then log-normalized: `(log10(raw + 1) - 2) * 25`, clamped to [0, 100].
/// Typical sessions land between 1k and 100k output tokens per dollar,
/// which maps to roughly 25–75.
pub fn session_efficiency_score(session: &Session) -> f64 {
    let output = session.tokens.output_tokens.max(0) as f64;
    let cost = if session.cost > 0.0 {
        session.cost
    } else {
        0.0001
    };
    let cache_read = session.tokens.cache_read_tokens.max(0) as f64;
    let input = if session.tokens.input_tokens > 0 {
        session.tokens.input_tokens as f64
    } else {
        1.0
    };

    let base = output / cost;
    let cache_bonus = cache_read / (input + cache_read) * 0.5;
    let raw = (base * (1.0 + cache_bonus)).max(0.0);

    (((raw + 1.0).log10() - 2.0) * 25.0).clamp(0.0, 100.0)
}

impl EfficiencyAnalyzer {
    fn cost_per_token(sessions: &[&Session]) -> CostPerTokenReport {
        let mut groups: BTreeMap<String, ModelCostPerToken> = BTreeMap::new();
        for session in sessions {
            let group = groups
                .entry(session.model.clone())
                .or_insert_with(|| ModelCostPerToken {
                    model: session.model.clone(),
                    sessions: 0,
                    total_cost: 0.0,
                    total_tokens: 0,
                    cost_per_million_tokens: 0.0,
                });
            group.sessions += 1;
            group.total_cost += session.cost;
            group.total_tokens += session.total_tokens;
        }

        let mut by_model: Vec<_> = groups
            .into_values()
            .map(|mut g| {
                g.cost_per_million_tokens = if g.total_tokens > 0 {
                    g.total_cost / g.total_tokens as f64 * 1_000_000.0
                } else {
                    0.0
                };
                g
            })
            .collect();
        by_model.sort_by(|a, b| {
            a.cost_per_million_tokens
                .partial_cmp(&b.cost_per_million_tokens)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let average = mean(
            &by_model
                .iter()
                .map(|m| m.cost_per_million_tokens)
                .collect::<Vec<_>>(),
        );
        CostPerTokenReport {
            cheapest: by_model.first().cloned(),
            most_expensive: by_model.last().cloned(),
            by_model,
            average,
        }
    }

    fn cost_per_prompt(sessions: &[&Session]) -> CostPerPromptReport {
        let mut groups: BTreeMap<String, ModelCostPerPrompt> = BTreeMap::new();
        for session in sessions {
            let group = groups
                .entry(session.model.clone())
                .or_insert_with(|| ModelCostPerPrompt {
                    model: session.model.clone(),
                    sessions: 0,
                    total_cost: 0.0,
                    total_prompts: 0,
                    cost_per_prompt: 0.0,
                });
            group.sessions += 1;
            group.total_cost += session.cost;
            group.total_prompts += session.user_interactions;
        }

        let mut by_model: Vec<_> = groups
            .into_values()
            .map(|mut g| {
                g.cost_per_prompt = if g.total_prompts > 0 {
                    g.total_cost / g.total_prompts as f64
                } else {
                    0.0
                };
                g
            })
            .collect();
        by_model.sort_by(|a, b| {
            a.cost_per_prompt
                .partial_cmp(&b.cost_per_prompt)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let average = mean(
            &by_model
                .iter()
                .map(|m| m.cost_per_prompt)
                .collect::<Vec<_>>(),
        );
        CostPerPromptReport {
            cheapest: by_model.first().cloned(),
            most_expensive: by_model.last().cloned(),
            by_model,
            average,
        }
    }

    fn cache_utilization(sessions: &[&Session]) -> CacheUtilizationReport {
        let mut groups: BTreeMap<String, ModelCacheUtilization> = BTreeMap::new();
        for session in sessions {
            let group = groups
                .entry(session.model.clone())
                .or_insert_with(|| ModelCacheUtilization {
                    model: session.model.clone(),
                    sessions: 0,
                    total_input: 0,
                    total_cache_read: 0,
                    total_cache_creation: 0,
                    cache_hit_rate: 0.0,
                });
            group.sessions += 1;
            group.total_input += session.tokens.input_tokens;
            group.total_cache_read += session.tokens.cache_read_tokens;
            group.total_cache_creation += session.tokens.cache_creation_tokens;
        }

        let mut by_model: Vec<_> = groups
            .into_values()
            .map(|mut g| {
                let potential = g.total_input + g.total_cache_read;
                g.cache_hit_rate = if potential > 0 {
                    g.total_cache_read as f64 / potential as f64 * 100.0
                } else {
                    0.0
                };
                g
            })
            .collect();
        by_model.sort_by(|a, b| {
            b.cache_hit_rate
                .partial_cmp(&a.cache_hit_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_input: i64 = by_model.iter().map(|m| m.total_input).sum();
        let total_cache_read: i64 = by_model.iter().map(|m| m.total_cache_read).sum();
        let potential = total_input + total_cache_read;

        CacheUtilizationReport {
            overall: OverallCacheUtilization {
                hit_rate: if potential > 0 {
                    total_cache_read as f64 / potential as f64 * 100.0
                } else {
                    0.0
                },
                total_cache_read,
                total_input,
            },
            best_performer: by_model.first().cloned(),
            worst_performer: by_model.last().cloned(),
            by_model,
        }
    }

    fn efficiency_scores(sessions: &[&Session]) -> EfficiencyScores {
        let mut scored: Vec<ScoredSession> = sessions
            .iter()
            .map(|s| ScoredSession {
                id: s.id.clone(),
                model: s.model.clone(),
                score: session_efficiency_score(s),
                cost: s.cost,
                total_tokens: s.total_tokens,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let stats = basic_stats(&scored.iter().map(|s| s.score).collect::<Vec<_>>());
        let top10 = scored.iter().take(10).cloned().collect();
        let bottom10 = scored.iter().rev().take(10).cloned().collect();

        EfficiencyScores {
            stats,
            top10,
            bottom10,
        }
    }

    fn value_leaders(sessions: &[&Session]) -> ValueLeaders {
        let mut by_cost_per_token: Vec<ValueLeader> = sessions
            .iter()
            .filter(|s| s.total_tokens > 0)
            .map(|s| ValueLeader {
                id: s.id.clone(),
                model: s.model.clone(),
                metric: s.cost / s.total_tokens as f64 * 1_000_000.0,
            })
            .collect();
        by_cost_per_token.sort_by(|a, b| {
            a.metric
                .partial_cmp(&b.metric)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        by_cost_per_token.truncate(5);

        let mut by_cache: Vec<ValueLeader> = sessions
            .iter()
            .filter(|s| s.tokens.input_tokens > 0)
            .map(|s| ValueLeader {
                id: s.id.clone(),
                model: s.model.clone(),
                metric: s.cache_hit_rate(),
            })
            .collect();
        by_cache.sort_by(|a, b| {
            b.metric
                .partial_cmp(&a.metric)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        by_cache.truncate(5);

        let mut by_score: Vec<ValueLeader> = sessions
            .iter()
            .map(|s| ValueLeader {
                id: s.id.clone(),
                model: s.model.clone(),
                metric: session_efficiency_score(s),
            })
            .collect();
        by_score.sort_by(|a, b| {
            b.metric
                .partial_cmp(&a.metric)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        by_score.truncate(5);

        ValueLeaders {
            best_cost_per_token: by_cost_per_token,
            best_cache_utilization: by_cache,
            most_efficient: by_score,
        }
    }

    fn recommendations(sessions: &[&Session]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let total_input: i64 = sessions.iter().map(|s| s.tokens.input_tokens).sum();
        let total_cache: i64 = sessions.iter().map(|s| s.tokens.cache_read_tokens).sum();
        let cache_rate = if total_input > 0 {
            total_cache as f64 / total_input as f64 * 100.0
        } else {
            0.0
        };
        if cache_rate < 10.0 && total_input > 1_000_000 {
            recommendations.push(Recommendation {
                category: "cache_optimization".to_string(),
                priority: Severity::High,
                message: format!("Low cache utilization: {}", format_percentage(cache_rate)),
                action: "Enable prompt caching to reduce costs by up to 90%".to_string(),
                estimated_savings: "High".to_string(),
            });
        }

        let total_cost: f64 = sessions.iter().map(|s| s.cost).sum();
        let premium_cost: f64 = sessions
            .iter()
            .filter(|s| s.model.contains("sonnet") || s.model.contains("gpt-4"))
            .map(|s| s.cost)
            .sum();
        if total_cost > 0.0 && premium_cost / total_cost > 0.8 {
            recommendations.push(Recommendation {
                category: "model_optimization".to_string(),
                priority: Severity::Medium,
                message: "Heavy use of premium models".to_string(),
                action: "Consider using faster, cheaper models for routine tasks".to_string(),
                estimated_savings: "Medium".to_string(),
            });
        }

        let avg_score = mean(
            &sessions
                .iter()
                .map(|s| session_efficiency_score(s))
                .collect::<Vec<_>>(),
        );
        if avg_score < 30.0 {
            recommendations.push(Recommendation {
                category: "general_efficiency".to_string(),
                priority: Severity::Medium,
                message: format!("Low average efficiency score: {avg_score:.0}/100"),
                action: "Review prompting strategies and optimize token usage".to_string(),
                estimated_savings: "Medium".to_string(),
            });
        }

        recommendations
    }
}

impl Analyzer for EfficiencyAnalyzer {
    type Report = EfficiencyReport;

    fn name(&self) -> &'static str {
        "efficiency"
    }

    fn analyze(&self, sessions: &[Session], options: &AnalyzeOptions) -> Result<EfficiencyReport> {
        validate_sessions(sessions)?;
        let filtered = filtered(sessions, options);

        Ok(EfficiencyReport {
            cost_per_token: Self::cost_per_token(&filtered),
            cost_per_prompt: Self::cost_per_prompt(&filtered),
            cache_utilization: Self::cache_utilization(&filtered),
            efficiency_scores: Self::efficiency_scores(&filtered),
            value_leaders: Self::value_leaders(&filtered),
            recommendations: Self::recommendations(&filtered),
        })
    }

    fn generate_insights(&self, report: &EfficiencyReport) -> Vec<Insight> {
        let mut insights = Vec::new();

        if report.cache_utilization.overall.hit_rate < 10.0 {
            insights.push(Insight {
                kind: InsightKind::Opportunity,
                category: "cache".to_string(),
                message: format!(
                    "Low cache hit rate: {}",
                    format_percentage(report.cache_utilization.overall.hit_rate)
                ),
                severity: Severity::High,
                recommendation:
                    "Significant cost savings available through better cache utilization"
                        .to_string(),
            });
        }

        if report.cost_per_token.average > 50.0 {
            insights.push(Insight {
                kind: InsightKind::Warning,
                category: "cost_efficiency".to_string(),
                message: format!(
                    "High average cost per million tokens: {}",
                    format_cost(report.cost_per_token.average)
                ),
                severity: Severity::Medium,
                recommendation: "Consider model mix optimization".to_string(),
            });
        }

        if let Some(top) = report.value_leaders.most_efficient.first() {
            insights.push(Insight {
                kind: InsightKind::Success,
                category: "value_leaders".to_string(),
                message: format!("Top efficiency score: {:.0}/100", top.metric),
                severity: Severity::Low,
                recommendation: "Study top-performing sessions to replicate success patterns"
                    .to_string(),
            });
        }

        insights
    }
}
