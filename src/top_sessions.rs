//! Top-sessions ranking
//!
//! Ranks the cost/token-annotated session population by one of five
//! criteria and enriches every ranked session with an efficiency
//! assessment, human-readable warnings and recommendations. The outlier
//! mode is statistical (cost beyond mean + 2σ) and has no fixed result
//! count.

use crate::stats::{basic_stats, BasicStats};
use crate::types::Session;
use serde::{Deserialize, Serialize};

/// Ranking criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    /// Highest cost first (cost > 0 only)
    Cost,
    /// Highest token count first (total tokens > 0 only)
    Tokens,
    /// Longest active duration first (duration > 0 only)
    Duration,
    /// Highest cost per million tokens first (tokens > 0 and cost > 0)
    Efficiency,
    /// Cost outliers beyond mean + 2σ, no limit
    Outliers,
}

impl std::str::FromStr for RankBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost" => Ok(Self::Cost),
            "tokens" => Ok(Self::Tokens),
            "duration" => Ok(Self::Duration),
            "efficiency" => Ok(Self::Efficiency),
            "outliers" => Ok(Self::Outliers),
            _ => Err(format!("Invalid ranking criterion: {s}")),
        }
    }
}

impl std::fmt::Display for RankBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cost => "cost",
            Self::Tokens => "tokens",
            Self::Duration => "duration",
            Self::Efficiency => "efficiency",
            Self::Outliers => "outliers",
        };
        write!(f, "{name}")
    }
}

/// Efficiency status attached to a ranked session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficiencyStatus {
    Good,
    Fair,
    Poor,
}

/// Per-session efficiency assessment.
///
/// Starts at 100 and deducts for exceeding the model's expected
/// cost-per-million band, for low cache utilization on input-heavy
/// sessions, and for extremely large sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEfficiency {
    /// 0–100 after deductions
    pub score: f64,
    pub status: EfficiencyStatus,
    /// What went wrong, in deduction order
    pub issues: Vec<String>,
    pub cost_per_million_tokens: f64,
    /// Percentage of prospective input served from cache
    pub cache_hit_rate: f64,
}

/// A session enriched for ranking output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSession {
    #[serde(flatten)]
    pub session: Session,
    /// Criterion that selected this session
    pub analysis_type: String,
    /// USD per million tokens (only for sessions with tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_million_tokens: Option<f64>,
    /// Standard deviations above the mean (outlier mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_multiple: Option<f64>,
    pub efficiency: SessionEfficiency,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Summary statistics over a ranked subset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSummary {
    pub total_cost: f64,
    pub total_tokens: i64,
    pub avg_cost: f64,
    pub avg_tokens: f64,
    pub avg_efficiency: f64,
    pub cost_stats: BasicStats,
    pub token_stats: BasicStats,
}

/// Expected cost-per-million band for a model; sessions far above it lose
/// efficiency points
fn expected_cost_band(model: &str) -> (f64, f64) {
    match model {
        "claude-3-5-sonnet-20241022" => (3.0, 15.0),
        "glm-4" => (0.5, 2.5),
        "gpt-4o" => (2.5, 10.0),
        _ => (0.0, 20.0),
    }
}

/// Ranks and enriches sessions
#[derive(Debug, Default)]
pub struct TopSessionsRanker;

impl TopSessionsRanker {
    /// Rank by the chosen criterion. `limit` caps every mode except
    /// [`RankBy::Outliers`].
    pub fn rank(&self, sessions: &[Session], by: RankBy, limit: usize) -> Vec<RankedSession> {
        match by {
            RankBy::Cost => self.top_by_cost(sessions, limit),
            RankBy::Tokens => self.top_by_tokens(sessions, limit),
            RankBy::Duration => self.top_by_duration(sessions, limit),
            RankBy::Efficiency => self.most_inefficient(sessions, limit),
            RankBy::Outliers => self.outliers(sessions),
        }
    }

    /// Most expensive sessions first
    pub fn top_by_cost(&self, sessions: &[Session], limit: usize) -> Vec<RankedSession> {
        let mut selected: Vec<&Session> = sessions.iter().filter(|s| s.cost > 0.0).collect();
        selected.sort_by(|a, b| {
            b.cost
                .partial_cmp(&a.cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        selected
            .into_iter()
            .take(limit)
            .map(|s| self.enrich(s, "cost", None))
            .collect()
    }

    /// Largest sessions first
    pub fn top_by_tokens(&self, sessions: &[Session], limit: usize) -> Vec<RankedSession> {
        let mut selected: Vec<&Session> =
            sessions.iter().filter(|s| s.total_tokens > 0).collect();
        selected.sort_by(|a, b| b.total_tokens.cmp(&a.total_tokens));
        selected
            .into_iter()
            .take(limit)
            .map(|s| self.enrich(s, "tokens", None))
            .collect()
    }

    /// Longest sessions first
    pub fn top_by_duration(&self, sessions: &[Session], limit: usize) -> Vec<RankedSession> {
        let mut selected: Vec<&Session> =
            sessions.iter().filter(|s| s.active_time_ms > 0).collect();
        selected.sort_by(|a, b| b.active_time_ms.cmp(&a.active_time_ms));
        selected
            .into_iter()
            .take(limit)
            .map(|s| self.enrich(s, "duration", None))
            .collect()
    }

    /// Worst cost-per-million-tokens first
    pub fn most_inefficient(&self, sessions: &[Session], limit: usize) -> Vec<RankedSession> {
        let mut selected: Vec<(&Session, f64)> = sessions
            .iter()
            .filter(|s| s.total_tokens > 0 && s.cost > 0.0)
            .map(|s| (s, s.cost / s.total_tokens as f64 * 1_000_000.0))
            .collect();
        selected.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        selected
            .into_iter()
            .take(limit)
            .map(|(s, _)| self.enrich(s, "efficiency", None))
            .collect()
    }

    /// Cost outliers beyond mean + 2σ. Returns every outlier; there is no
    /// meaningful fixed count for an anomaly list.
    pub fn outliers(&self, sessions: &[Session]) -> Vec<RankedSession> {
        let costs: Vec<f64> = sessions
            .iter()
            .map(|s| s.cost)
            .filter(|&c| c > 0.0)
            .collect();
        let stats = basic_stats(&costs);
        if stats.std_dev == 0.0 {
            return Vec::new();
        }
        let threshold = stats.mean + 2.0 * stats.std_dev;

        sessions
            .iter()
            .filter(|s| s.cost > threshold)
            .map(|s| {
                let deviation = (s.cost - stats.mean) / stats.std_dev;
                self.enrich(s, "outlier", Some(deviation))
            })
            .collect()
    }

    /// Summary statistics over a ranked subset
    pub fn summary_stats(&self, ranked: &[RankedSession]) -> RankedSummary {
        if ranked.is_empty() {
            return RankedSummary::default();
        }

        let costs: Vec<f64> = ranked.iter().map(|r| r.session.cost).collect();
        let tokens: Vec<f64> = ranked
            .iter()
            .map(|r| r.session.total_tokens as f64)
            .collect();
        let scores: Vec<f64> = ranked.iter().map(|r| r.efficiency.score).collect();

        let total_cost: f64 = costs.iter().sum();
        let total_tokens: i64 = ranked.iter().map(|r| r.session.total_tokens).sum();

        RankedSummary {
            total_cost,
            total_tokens,
            avg_cost: total_cost / costs.len() as f64,
            avg_tokens: tokens.iter().sum::<f64>() / tokens.len() as f64,
            avg_efficiency: scores.iter().sum::<f64>() / scores.len() as f64,
            cost_stats: basic_stats(&costs),
            token_stats: basic_stats(&tokens),
        }
    }

    fn enrich(
        &self,
        session: &Session,
        analysis_type: &str,
        deviation_multiple: Option<f64>,
    ) -> RankedSession {
        let efficiency = assess_efficiency(session);
        let warnings = generate_warnings(session, &efficiency);
        let recommendations = generate_recommendations(session, &efficiency);
        let cost_per_million_tokens = (session.total_tokens > 0)
            .then(|| session.cost / session.total_tokens as f64 * 1_000_000.0);

        RankedSession {
            session: session.clone(),
            analysis_type: analysis_type.to_string(),
            cost_per_million_tokens,
            deviation_multiple,
            efficiency,
            warnings,
            recommendations,
        }
    }
}

/// Assess a single session's efficiency, starting at 100 and deducting
fn assess_efficiency(session: &Session) -> SessionEfficiency {
    let cost_per_million = if session.total_tokens > 0 {
        session.cost / session.total_tokens as f64 * 1_000_000.0
    } else {
        0.0
    };
    let cache_hit_rate = session.cache_hit_rate();

    let mut score: f64 = 100.0;
    let mut issues = Vec::new();
    let mut status = EfficiencyStatus::Good;

    let (_, expected_max) = expected_cost_band(&session.model);
    if cost_per_million > expected_max * 1.5 {
        score -= 30.0;
        issues.push("Very high cost per token".to_string());
        status = EfficiencyStatus::Poor;
    } else if cost_per_million > expected_max {
        score -= 15.0;
        issues.push("High cost per token".to_string());
        status = EfficiencyStatus::Fair;
    }

    if session.tokens.input_tokens > 10_000 && cache_hit_rate < 0.1 {
        score -= 20.0;
        issues.push("Low cache utilization".to_string());
        if status == EfficiencyStatus::Good {
            status = EfficiencyStatus::Fair;
        }
    }

    if session.total_tokens > 50_000_000 {
        score -= 15.0;
        issues.push("Very large session (consider splitting)".to_string());
        if status == EfficiencyStatus::Good {
            status = EfficiencyStatus::Fair;
        }
    }

    SessionEfficiency {
        score: score.max(0.0),
        status,
        issues,
        cost_per_million_tokens: cost_per_million,
        cache_hit_rate: cache_hit_rate * 100.0,
    }
}

fn generate_warnings(session: &Session, efficiency: &SessionEfficiency) -> Vec<String> {
    let mut warnings = Vec::new();
    if session.cost > 50.0 {
        warnings.push("Very expensive session".to_string());
    }
    if session.total_tokens > 50_000_000 {
        warnings.push("Very high token usage".to_string());
    }
    if session.active_time_ms > 3_600_000 {
        warnings.push("Very long duration (possibly stuck)".to_string());
    }
    if efficiency.status == EfficiencyStatus::Poor {
        warnings.push("Poor efficiency".to_string());
    }
    warnings
}

fn generate_recommendations(session: &Session, efficiency: &SessionEfficiency) -> Vec<String> {
    let mut recommendations = Vec::new();
    if session.cost > 50.0 {
        recommendations.push("Consider breaking this into smaller sessions".to_string());
    }
    if efficiency.cache_hit_rate < 10.0 && session.tokens.input_tokens > 10_000 {
        recommendations.push("Enable prompt caching to reduce costs".to_string());
    }
    if session.model == "claude-3-5-sonnet-20241022" && session.tokens.output_tokens < 1_000 {
        recommendations.push("Consider using Haiku for simple tasks (5x cheaper)".to_string());
    }
    if session.total_tokens > 50_000_000 {
        recommendations.push("Review prompting strategy to reduce token usage".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionId, TokenCounts};

    fn session(id: &str, cost: f64, total_tokens: i64, duration_ms: i64) -> Session {
        let tokens = TokenCounts::new(total_tokens, 0, 0, 0, 0);
        Session {
            id: SessionId::new(id),
            date: None,
            model: "glm-4".to_string(),
            provider: "zhipuai".to_string(),
            tokens,
            active_time_ms: duration_ms,
            user_interactions: 1,
            total_tokens,
            cost,
        }
    }

    #[test]
    fn test_rank_by_cost_filters_and_sorts() {
        let sessions = vec![
            session("free", 0.0, 100, 10),
            session("mid", 1.0, 100, 10),
            session("high", 5.0, 100, 10),
        ];

        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Cost, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].session.id.as_str(), "high");
        assert_eq!(ranked[1].session.id.as_str(), "mid");
        assert_eq!(ranked[0].analysis_type, "cost");
    }

    #[test]
    fn test_rank_limit_applies() {
        let sessions: Vec<Session> = (1..=5)
            .map(|i| session(&format!("s{i}"), i as f64, 100, 10))
            .collect();
        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Cost, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].session.id.as_str(), "s5");
    }

    #[test]
    fn test_rank_by_duration() {
        let sessions = vec![
            session("short", 1.0, 100, 1_000),
            session("idle", 1.0, 100, 0),
            session("long", 1.0, 100, 60_000),
        ];
        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Duration, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].session.id.as_str(), "long");
    }

    #[test]
    fn test_inefficient_ranking() {
        // Same spend, fewer tokens means a worse cost-per-million.
        let sessions = vec![
            session("efficient", 1.0, 10_000_000, 10),
            session("wasteful", 1.0, 10_000, 10),
        ];
        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Efficiency, 10);
        assert_eq!(ranked[0].session.id.as_str(), "wasteful");
        assert!(ranked[0].cost_per_million_tokens.unwrap() > 50.0);
    }

    #[test]
    fn test_outliers_beyond_two_sigma() {
        let mut sessions: Vec<Session> = (0..20)
            .map(|i| session(&format!("s{i}"), 1.0, 100, 10))
            .collect();
        sessions.push(session("whale", 50.0, 100, 10));

        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Outliers, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].session.id.as_str(), "whale");
        assert!(ranked[0].deviation_multiple.unwrap() > 2.0);
        assert_eq!(ranked[0].analysis_type, "outlier");
    }

    #[test]
    fn test_outliers_empty_for_uniform_costs() {
        let sessions: Vec<Session> = (0..5).map(|i| session(&format!("s{i}"), 2.0, 100, 10)).collect();
        assert!(TopSessionsRanker.outliers(&sessions).is_empty());
    }

    #[test]
    fn test_efficiency_deductions() {
        // glm-4 expected max is $2.50 per million; $10 per million is far
        // out of band, and the 1M uncached input tokens deduct as well.
        let over_band = session("over", 10.0, 1_000_000, 10);
        let assessed = assess_efficiency(&over_band);
        assert_eq!(assessed.score, 50.0);
        assert_eq!(assessed.status, EfficiencyStatus::Poor);
        assert_eq!(assessed.issues.len(), 2);

        // Input-heavy with no cache reads also loses points.
        let mut uncached = session("uncached", 0.02, 20_000, 10);
        uncached.tokens.input_tokens = 20_000;
        let assessed = assess_efficiency(&uncached);
        assert!(assessed.issues.contains(&"Low cache utilization".to_string()));
        assert_eq!(assessed.status, EfficiencyStatus::Fair);
    }

    #[test]
    fn test_warnings_and_recommendations() {
        let mut huge = session("huge", 80.0, 60_000_000, 4_000_000);
        huge.tokens.input_tokens = 60_000_000;
        let ranked = TopSessionsRanker.rank(&[huge], RankBy::Cost, 10);
        let enriched = &ranked[0];

        assert!(enriched
            .warnings
            .iter()
            .any(|w| w.contains("expensive session")));
        assert!(enriched
            .warnings
            .iter()
            .any(|w| w.contains("token usage")));
        assert!(enriched
            .warnings
            .iter()
            .any(|w| w.contains("long duration")));
        assert!(enriched
            .recommendations
            .iter()
            .any(|r| r.contains("smaller sessions")));
        assert!(enriched
            .recommendations
            .iter()
            .any(|r| r.contains("prompt caching")));
    }

    #[test]
    fn test_summary_stats() {
        let sessions = vec![
            session("a", 2.0, 1_000, 10),
            session("b", 4.0, 3_000, 10),
        ];
        let ranked = TopSessionsRanker.rank(&sessions, RankBy::Cost, 10);
        let summary = TopSessionsRanker.summary_stats(&ranked);

        assert!((summary.total_cost - 6.0).abs() < 1e-9);
        assert_eq!(summary.total_tokens, 4_000);
        assert!((summary.avg_cost - 3.0).abs() < 1e-9);
        assert_eq!(summary.cost_stats.count, 2);
        assert!((summary.cost_stats.max - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_by_parsing() {
        assert_eq!("cost".parse::<RankBy>().unwrap(), RankBy::Cost);
        assert_eq!("OUTLIERS".parse::<RankBy>().unwrap(), RankBy::Outliers);
        assert!("bogus".parse::<RankBy>().is_err());
    }
}
