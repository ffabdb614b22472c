//! Output formatting module
//!
//! Formatters for displaying reports in two shapes:
//! - table format for human-readable terminal output,
//! - JSON format for machine consumption and piping into other tools.
//!
//! # Examples
//!
//! ```no_run
//! use droidusage::output::get_formatter;
//! # use droidusage::service::DailyReport;
//! # fn demo(report: &DailyReport) {
//! let formatter = get_formatter(false);
//! println!("{}", formatter.format_daily(report));
//!
//! let json = get_formatter(true);
//! println!("{}", json.format_daily(report));
//! # }
//! ```

use crate::aggregation::Summary;
use crate::format::{format_cost, format_duration_ms, format_number};
use crate::orchestrator::AnalysisReport;
use crate::service::{BlockReport, DailyReport, SessionReport, TopReport, TrendsReport};
use crate::trends::{MetricTrend, TrendDirection};
use colored::Colorize;
use prettytable::{format, row, Table};

/// Trait for report formatters
pub trait ReportFormatter {
    /// Format the daily-by-model report
    fn format_daily(&self, report: &DailyReport) -> String;
    /// Format the per-session report
    fn format_sessions(&self, report: &SessionReport) -> String;
    /// Format the 5-hour block report
    fn format_blocks(&self, report: &BlockReport) -> String;
    /// Format the top-sessions report
    fn format_top(&self, report: &TopReport) -> String;
    /// Format the trends report
    fn format_trends(&self, report: &TrendsReport) -> String;
    /// Format the statistical analysis report
    fn format_analysis(&self, report: &AnalysisReport) -> String;
}

/// Get the formatter for the requested output shape
pub fn get_formatter(json: bool) -> Box<dyn ReportFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}

/// Human-readable table formatter
pub struct TableFormatter;

impl TableFormatter {
    fn new_table() -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table
    }

    fn summary_block(summary: &Summary) -> String {
        format!(
            "\n{}\n  Total Sessions: {}\n  Total Tokens: {}\n  Total Prompts: {}\n  Total Cost: {}\n  Total Active Time: {}\n",
            "Summary:".bold(),
            format_number(summary.total_sessions as i64),
            format_number(summary.total_tokens),
            format_number(summary.total_prompts as i64),
            format_cost(summary.total_cost),
            format_duration_ms(summary.total_active_time),
        )
    }

    fn short_id(id: &str) -> String {
        if id.len() > 8 {
            format!("{}...", &id[..8])
        } else {
            id.to_string()
        }
    }

    fn trend_cell(trend: &MetricTrend, down_is_good: bool) -> String {
        let sign = if trend.percentage >= 0.0 { "+" } else { "" };
        let text = format!("{} {sign}{:.1}%", trend.indicator, trend.percentage);
        match trend.direction {
            TrendDirection::Stable => text.dimmed().to_string(),
            TrendDirection::Up if down_is_good => text.red().to_string(),
            TrendDirection::Up => text.green().to_string(),
            TrendDirection::Down if down_is_good => text.green().to_string(),
            TrendDirection::Down => text.red().to_string(),
        }
    }
}

impl ReportFormatter for TableFormatter {
    fn format_daily(&self, report: &DailyReport) -> String {
        if report.data.is_empty() {
            return "No session data found.".to_string();
        }

        let mut table = Self::new_table();
        table.set_titles(row![
            b->"Date",
            b->"Model",
            b->"Input",
            b->"Output",
            b->"Cache Create",
            b->"Cache Read",
            b->"Total Tokens",
            b->"Prompts",
            b->"Cost (USD)"
        ]);

        let mut last_date = "";
        for group in &report.data {
            let date_display = if group.date == last_date {
                ""
            } else {
                &group.date
            };
            last_date = &group.date;
            table.add_row(row![
                date_display,
                group.model,
                r->format_number(group.tokens.input_tokens),
                r->format_number(group.tokens.output_tokens),
                r->format_number(group.tokens.cache_creation_tokens),
                r->format_number(group.tokens.cache_read_tokens),
                r->format_number(group.total_tokens),
                r->format_number(group.user_interactions as i64),
                r->format_cost(group.cost)
            ]);
        }

        format!("{table}{}", Self::summary_block(&report.summary))
    }

    fn format_sessions(&self, report: &SessionReport) -> String {
        if report.data.is_empty() {
            return "No session data found.".to_string();
        }

        let mut table = Self::new_table();
        table.set_titles(row![
            b->"Session ID",
            b->"Date",
            b->"Model",
            b->"Input",
            b->"Output",
            b->"Cache",
            b->"Total",
            b->"Cost",
            b->"Active Time",
            b->"Prompts"
        ]);

        for session in &report.data {
            table.add_row(row![
                Self::short_id(session.id.as_str()),
                session
                    .date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                session.model,
                r->format_number(session.tokens.input_tokens),
                r->format_number(session.tokens.output_tokens),
                r->format_number(
                    session.tokens.cache_creation_tokens + session.tokens.cache_read_tokens
                ),
                r->format_number(session.total_tokens),
                r->format_cost(session.cost),
                r->format_duration_ms(session.active_time_ms),
                r->format_number(session.user_interactions as i64)
            ]);
        }

        format!("{table}{}", Self::summary_block(&report.summary))
    }

    fn format_blocks(&self, report: &BlockReport) -> String {
        if report.data.is_empty() {
            return "No session data found.".to_string();
        }

        let mut table = Self::new_table();
        table.set_titles(row![
            b->"Date",
            b->"Time Block",
            b->"Model(s)",
            b->"Sessions",
            b->"Input",
            b->"Output",
            b->"Cache Create",
            b->"Cache Read",
            b->"Total Tokens",
            b->"Prompts",
            b->"Cost (USD)"
        ]);

        let mut last_date = "";
        for block in &report.data {
            let date_display = if block.date == last_date {
                ""
            } else {
                &block.date
            };
            last_date = &block.date;
            table.add_row(row![
                date_display,
                block.time_range,
                block.models,
                r->format_number(block.sessions.len() as i64),
                r->format_number(block.tokens.input_tokens),
                r->format_number(block.tokens.output_tokens),
                r->format_number(block.tokens.cache_creation_tokens),
                r->format_number(block.tokens.cache_read_tokens),
                r->format_number(block.total_tokens),
                r->format_number(block.user_prompts as i64),
                r->format_cost(block.cost)
            ]);
        }

        format!("{table}{}", Self::summary_block(&report.summary))
    }

    fn format_top(&self, report: &TopReport) -> String {
        if report.data.is_empty() {
            return "No session data found.".to_string();
        }

        let mut table = Self::new_table();
        table.set_titles(row![
            b->"#",
            b->"Session ID",
            b->"Date",
            b->"Model",
            b->"Cost",
            b->"Tokens",
            b->"Duration",
            b->"Score",
            b->"Status"
        ]);

        for (rank, entry) in report.data.iter().enumerate() {
            let session = &entry.session;
            table.add_row(row![
                r->format!("{}", rank + 1),
                Self::short_id(session.id.as_str()),
                session
                    .date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
                session.model,
                r->format_cost(session.cost),
                r->format_number(session.total_tokens),
                r->format_duration_ms(session.active_time_ms),
                r->format!("{:.0}", entry.efficiency.score),
                format!("{:?}", entry.efficiency.status).to_lowercase()
            ]);
        }

        let mut out = format!("Top sessions by {}\n{table}", report.by);

        for entry in &report.data {
            if entry.warnings.is_empty() && entry.recommendations.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "\n{}:\n",
                Self::short_id(entry.session.id.as_str()).bold()
            ));
            for warning in &entry.warnings {
                out.push_str(&format!("  {} {warning}\n", "warning:".yellow()));
            }
            for recommendation in &entry.recommendations {
                out.push_str(&format!("  {} {recommendation}\n", "hint:".cyan()));
            }
        }

        out.push_str(&format!(
            "\n{}\n  Total Cost: {}\n  Avg Cost: {}\n  Total Tokens: {}\n  Avg Efficiency: {:.0}/100\n",
            "Summary:".bold(),
            format_cost(report.summary.total_cost),
            format_cost(report.summary.avg_cost),
            format_number(report.summary.total_tokens),
            report.summary.avg_efficiency,
        ));
        out
    }

    fn format_trends(&self, report: &TrendsReport) -> String {
        let mut table = Self::new_table();
        table.set_titles(row![b->"Metric", b->"Current", b->"Previous", b->"Change"]);

        let rows: [(&str, &MetricTrend, bool, bool); 7] = [
            ("Cost", &report.trends.cost, true, true),
            ("Tokens", &report.trends.tokens, false, false),
            ("Sessions", &report.trends.sessions, false, false),
            ("Prompts", &report.trends.prompts, false, false),
            (
                "Avg Cost/Session",
                &report.trends.avg_cost_per_session,
                true,
                true,
            ),
            (
                "Avg Tokens/Session",
                &report.trends.avg_tokens_per_session,
                false,
                false,
            ),
            (
                "Avg Cost/Prompt",
                &report.trends.avg_cost_per_prompt,
                true,
                true,
            ),
        ];

        for (label, trend, as_cost, down_is_good) in rows {
            let render = |value: f64| {
                if as_cost {
                    format_cost(value)
                } else {
                    format_number(value.round() as i64)
                }
            };
            table.add_row(row![
                label,
                r->render(trend.value),
                r->render(trend.previous),
                r->Self::trend_cell(trend, down_is_good)
            ]);
        }

        let mut out = table.to_string();
        out.push_str(&format!(
            "\nPeak hour: {}   Peak day: {}\n",
            report.patterns.peak_hour_range, report.patterns.peak_day
        ));
        if !report.sparkline.is_empty() {
            let series: Vec<String> = report
                .sparkline
                .iter()
                .map(|c| format!("{c:.2}"))
                .collect();
            out.push_str(&format!("Daily cost (last 7d): {}\n", series.join(" ")));
        }
        out
    }

    fn format_analysis(&self, report: &AnalysisReport) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} sessions analyzed ({})\n",
            "Analysis:".bold(),
            report.session_count,
            report.analyzers_run.join(", ")
        ));
        out.push_str(&format!(
            "Overall health: {}\n",
            report.synthesized.overall_health
        ));

        let metrics = &report.synthesized.key_metrics;
        if let Some(total_cost) = metrics.total_cost {
            out.push_str(&format!("Total cost: {}\n", format_cost(total_cost)));
        }
        if let Some(burn) = &metrics.burn_rate {
            out.push_str(&format!(
                "Burn rate: {}/day, projected {}/month\n",
                format_cost(burn.daily_average),
                format_cost(burn.monthly_projection)
            ));
        }
        if let Some(score) = metrics.avg_efficiency_score {
            out.push_str(&format!("Avg efficiency score: {score:.0}/100\n"));
        }
        if let (Some(peak_hour), Some(busiest_day)) = (metrics.peak_hour, &metrics.busiest_day) {
            out.push_str(&format!(
                "Peak hour: {peak_hour}:00   Busiest day: {busiest_day}\n"
            ));
        }

        if !report.synthesized.alerts.is_empty() {
            out.push_str(&format!("\n{}\n", "Insights:".bold()));
            for alert in &report.synthesized.alerts {
                out.push_str(&format!(
                    "  [{:?}] {}\n      {}\n",
                    alert.severity, alert.message, alert.recommendation
                ));
            }
        }

        if !report.synthesized.recommendations.is_empty() {
            out.push_str(&format!("\n{}\n", "Recommendations:".bold()));
            for rec in &report.synthesized.recommendations {
                out.push_str(&format!("  {} -> {}\n", rec.message, rec.action));
            }
        }

        if !report.cross_insights.is_empty() {
            out.push_str(&format!("\n{}\n", "Correlations:".bold()));
            for insight in &report.cross_insights {
                out.push_str(&format!("  {}\n", insight.message));
            }
        }

        out
    }
}

/// Machine-readable JSON formatter
pub struct JsonFormatter;

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}

impl ReportFormatter for JsonFormatter {
    fn format_daily(&self, report: &DailyReport) -> String {
        to_json(report)
    }

    fn format_sessions(&self, report: &SessionReport) -> String {
        to_json(report)
    }

    fn format_blocks(&self, report: &BlockReport) -> String {
        to_json(report)
    }

    fn format_top(&self, report: &TopReport) -> String {
        to_json(report)
    }

    fn format_trends(&self, report: &TrendsReport) -> String {
        to_json(report)
    }

    fn format_analysis(&self, report: &AnalysisReport) -> String {
        to_json(report)
    }
}
