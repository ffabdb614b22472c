//! Analysis orchestration
//!
//! Runs a selected subset of the statistical analyzers over one session
//! population, isolates per-analyzer failures, and synthesizes the
//! combined picture: an overall health rating, key metrics, a flattened
//! recommendation/alert list, and a small set of fixed cross-analyzer
//! correlations.

use crate::analyzers::{
    Analyzer, AnalyzeOptions, BurnRate, CostAnalyzer, CostReport, EfficiencyAnalyzer,
    EfficiencyReport, Insight, InsightKind, PatternAnalyzer, PatternReport, Recommendation,
    Severity,
};
use crate::types::Session;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Which analyzers to run. With no explicit selection everything runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyzerSelection {
    pub cost: bool,
    pub patterns: bool,
    pub efficiency: bool,
    /// Force-run everything regardless of the individual flags
    pub all: bool,
}

impl AnalyzerSelection {
    /// Run every analyzer
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    fn effective(&self) -> (bool, bool, bool) {
        let none_selected = !self.cost && !self.patterns && !self.efficiency;
        if self.all || none_selected {
            (true, true, true)
        } else {
            (self.cost, self.patterns, self.efficiency)
        }
    }
}

/// Outcome of one analyzer run: a report with its insights, or the error
/// that stopped it. One analyzer failing never aborts the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOutcome<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<Insight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> AnalyzerOutcome<T> {
    fn success(result: T, insights: Vec<Insight>) -> Self {
        Self {
            result: Some(result),
            insights,
            error: None,
        }
    }

    fn failure(error: String) -> Self {
        Self {
            result: None,
            insights: Vec::new(),
            error: Some(error),
        }
    }
}

/// Per-analyzer results keyed by analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<AnalyzerOutcome<CostReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<AnalyzerOutcome<PatternReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<AnalyzerOutcome<EfficiencyReport>>,
}

/// Overall health rating derived from the average efficiency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthRating {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl HealthRating {
    /// ≥70 excellent, ≥50 good, ≥30 fair, else poor
    pub fn from_efficiency(avg_score: f64) -> Self {
        if avg_score >= 70.0 {
            Self::Excellent
        } else if avg_score >= 50.0 {
            Self::Good
        } else if avg_score >= 30.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

impl fmt::Display for HealthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Headline metrics pulled from whichever analyzers ran
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burn_rate: Option<BurnRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busiest_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_efficiency_score: Option<f64>,
}

/// Synthesis across all analyzer outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub overall_health: HealthRating,
    pub key_metrics: KeyMetrics,
    /// Flattened recommendations from every analyzer that produced any
    pub recommendations: Vec<Recommendation>,
    /// Flattened insights from every analyzer
    pub alerts: Vec<Insight>,
}

/// Full orchestration result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Generation time, RFC 3339
    pub timestamp: String,
    pub session_count: usize,
    pub analyzers_run: Vec<String>,
    pub results: AnalyzerResults,
    pub synthesized: Synthesis,
    pub cross_insights: Vec<Insight>,
}

/// Coordinates analyzer execution and result synthesis
#[derive(Debug, Default)]
pub struct AnalysisOrchestrator;

impl AnalysisOrchestrator {
    /// Run the selected analyzers and synthesize their results.
    ///
    /// The analyzers are pure CPU-bound functions; they are dispatched
    /// together and their results joined, which a sequential execution
    /// satisfies observably.
    pub fn run_analysis(
        &self,
        sessions: &[Session],
        selection: AnalyzerSelection,
        options: &AnalyzeOptions,
    ) -> AnalysisReport {
        let (run_cost, run_patterns, run_efficiency) = selection.effective();

        let mut results = AnalyzerResults::default();
        let mut analyzers_run = Vec::new();

        if run_cost {
            analyzers_run.push("cost".to_string());
            results.cost = Some(run_one(&CostAnalyzer, sessions, options));
        }
        if run_patterns {
            analyzers_run.push("patterns".to_string());
            results.patterns = Some(run_one(&PatternAnalyzer, sessions, options));
        }
        if run_efficiency {
            analyzers_run.push("efficiency".to_string());
            results.efficiency = Some(run_one(&EfficiencyAnalyzer, sessions, options));
        }

        let synthesized = Self::synthesize(&results);
        let cross_insights = Self::cross_insights(&results);

        AnalysisReport {
            timestamp: Utc::now().to_rfc3339(),
            session_count: sessions.len(),
            analyzers_run,
            results,
            synthesized,
            cross_insights,
        }
    }

    fn synthesize(results: &AnalyzerResults) -> Synthesis {
        let mut synthesis = Synthesis {
            overall_health: HealthRating::Unknown,
            key_metrics: KeyMetrics::default(),
            recommendations: Vec::new(),
            alerts: Vec::new(),
        };

        if let Some(cost) = results.cost.as_ref().and_then(|o| o.result.as_ref()) {
            synthesis.key_metrics.burn_rate = Some(cost.burn_rate.clone());
            synthesis.key_metrics.total_cost =
                Some(cost.by_model.iter().map(|m| m.total_cost).sum());
        }

        if let Some(patterns) = results.patterns.as_ref().and_then(|o| o.result.as_ref()) {
            synthesis.key_metrics.peak_hour = Some(patterns.peak_hours.peak_hour);
            synthesis.key_metrics.busiest_day = Some(patterns.busiest_days.busiest_day.clone());
        }

        if let Some(efficiency) = results.efficiency.as_ref().and_then(|o| o.result.as_ref()) {
            let avg = efficiency.efficiency_scores.stats.mean;
            synthesis.key_metrics.avg_efficiency_score = Some(avg);
            synthesis.overall_health = HealthRating::from_efficiency(avg);
            synthesis
                .recommendations
                .extend(efficiency.recommendations.iter().cloned());
        }

        for insights in [
            results.cost.as_ref().map(|o| &o.insights),
            results.patterns.as_ref().map(|o| &o.insights),
            results.efficiency.as_ref().map(|o| &o.insights),
        ]
        .into_iter()
        .flatten()
        {
            synthesis.alerts.extend(insights.iter().cloned());
        }

        synthesis
    }

    fn cross_insights(results: &AnalyzerResults) -> Vec<Insight> {
        let mut insights = Vec::new();

        let cost = results.cost.as_ref().and_then(|o| o.result.as_ref());
        let patterns = results.patterns.as_ref().and_then(|o| o.result.as_ref());
        let efficiency = results.efficiency.as_ref().and_then(|o| o.result.as_ref());

        if let (Some(cost), Some(patterns)) = (cost, patterns) {
            insights.push(Insight {
                kind: InsightKind::Correlation,
                category: "cost_timing".to_string(),
                message: format!(
                    "Peak usage at {} with {:.2} daily burn rate",
                    patterns.peak_hours.peak_hour_range, cost.burn_rate.daily_average
                ),
                severity: Severity::Low,
                recommendation: "Consider load balancing to distribute usage more evenly"
                    .to_string(),
            });
        }

        if let (Some(efficiency), Some(cost)) = (efficiency, cost) {
            let avg_score = efficiency.efficiency_scores.stats.mean;
            let monthly_burn = cost.burn_rate.monthly_projection;
            if avg_score < 40.0 && monthly_burn > 500.0 {
                insights.push(Insight {
                    kind: InsightKind::Warning,
                    category: "efficiency_cost".to_string(),
                    message: format!(
                        "Low efficiency ({avg_score:.0}/100) with high monthly costs (${monthly_burn:.2})"
                    ),
                    severity: Severity::High,
                    recommendation:
                        "Prioritize efficiency improvements for significant cost savings"
                            .to_string(),
                });
            }
        }

        if let (Some(patterns), Some(efficiency)) = (patterns, efficiency) {
            let long_sessions = patterns.session_duration.anomalies.len();
            let low_efficiency = efficiency.efficiency_scores.bottom10.len();
            if long_sessions > 0 && low_efficiency > 0 {
                insights.push(Insight {
                    kind: InsightKind::Info,
                    category: "duration_efficiency".to_string(),
                    message: format!(
                        "{long_sessions} long-duration sessions detected, {low_efficiency} low-efficiency sessions"
                    ),
                    severity: Severity::Low,
                    recommendation: "Review if long sessions correlate with low efficiency"
                        .to_string(),
                });
            }
        }

        insights
    }
}

fn run_one<A: Analyzer>(
    analyzer: &A,
    sessions: &[Session],
    options: &AnalyzeOptions,
) -> AnalyzerOutcome<A::Report> {
    match analyzer.analyze(sessions, options) {
        Ok(report) => {
            let insights = analyzer.generate_insights(&report);
            AnalyzerOutcome::success(report, insights)
        }
        Err(e) => {
            warn!("Analyzer {} failed: {e}", analyzer.name());
            AnalyzerOutcome::failure(e.to_string())
        }
    }
}
