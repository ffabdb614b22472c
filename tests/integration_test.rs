//! Integration tests for droidusage
//!
//! These exercise the full pipeline against a temporary on-disk session
//! layout: settings snapshots, transcripts and the shared streaming log.

use chrono::NaiveDate;
use droidusage::{
    data_loader::DataLoader,
    error::DroidusageError,
    filters::DateRangeFilter,
    orchestrator::AnalyzerSelection,
    pricing::PricingTable,
    service::UsageService,
    top_sessions::RankBy,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    sessions_dir: PathBuf,
    logs_dir: PathBuf,
}

impl Workspace {
    async fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let sessions_dir = temp.path().join("sessions");
        let logs_dir = temp.path().join("logs");
        tokio::fs::create_dir_all(&sessions_dir).await.unwrap();
        tokio::fs::create_dir_all(&logs_dir).await.unwrap();
        Self {
            _temp: temp,
            sessions_dir,
            logs_dir,
        }
    }

    fn service(&self) -> UsageService {
        UsageService::new(
            DataLoader::new(&self.sessions_dir),
            PricingTable::builtin(),
        )
    }

    async fn write_settings(
        &self,
        id: &str,
        provider: &str,
        timestamp: &str,
        input: i64,
        output: i64,
        cache_read: i64,
        cache_creation: i64,
    ) {
        let settings = format!(
            r#"{{
                "providerLock": "{provider}",
                "providerLockTimestamp": "{timestamp}",
                "assistantActiveTimeMs": 60000,
                "tokenUsage": {{
                    "inputTokens": {input},
                    "outputTokens": {output},
                    "cacheReadTokens": {cache_read},
                    "cacheCreationTokens": {cache_creation}
                }}
            }}"#
        );
        write(&self.sessions_dir, &format!("{id}.settings.json"), &settings).await;
    }

    async fn write_transcript(&self, id: &str, user_prompts: usize) {
        let mut lines = String::new();
        for i in 0..user_prompts {
            lines.push_str(&format!(
                "{{\"type\":\"message\",\"message\":{{\"role\":\"user\",\"content\":[{{\"type\":\"text\",\"text\":\"prompt {i}\"}}]}}}}\n"
            ));
        }
        lines.push_str(
            "{\"type\":\"message\",\"message\":{\"role\":\"user\",\"content\":[{\"type\":\"text\",\"text\":\"<system-reminder>injected</system-reminder>\"}]}}\n",
        );
        write(&self.sessions_dir, &format!("{id}.jsonl"), &lines).await;
    }

    async fn write_shared_log(&self, lines: &str) {
        write(&self.logs_dir, "droid-log-single.log", lines).await;
    }
}

async fn write(dir: &Path, name: &str, content: &str) {
    tokio::fs::write(dir.join(name), content).await.unwrap();
}

#[tokio::test]
async fn test_daily_usage_end_to_end() {
    let ws = Workspace::new().await;

    // Two GLM sessions and one GPT session on the same date.
    ws.write_settings("glm-a", "zhipuai", "2024-05-01T08:00:00Z", 600_000, 300_000, 60_000, 30_000)
        .await;
    ws.write_settings("glm-b", "zhipuai", "2024-05-01T12:00:00Z", 400_000, 200_000, 40_000, 20_000)
        .await;
    ws.write_settings(
        "gpt-a",
        "openai",
        "2024-05-01T15:00:00Z",
        2_000_000,
        1_000_000,
        200_000,
        100_000,
    )
    .await;
    ws.write_shared_log(concat!(
        r#"{"sessionId":"glm-a","modelId":"custom:glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"glm-b","modelId":"glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"gpt-a","modelId":"gpt-5-codex"}"#,
        "\n",
    ))
    .await;

    let report = ws.service().daily_usage(DateRangeFilter::new()).await.unwrap();
    assert_eq!(report.data.len(), 2);

    let glm = report.data.iter().find(|g| g.model == "glm-4.6").unwrap();
    assert_eq!(glm.sessions.len(), 2);
    assert_eq!(glm.tokens.input_tokens, 1_000_000);
    assert_eq!(glm.tokens.output_tokens, 500_000);
    // Combined GLM tokens match the worked pricing example exactly.
    assert!((glm.cost - 1.7675).abs() < 1e-9, "glm cost was {}", glm.cost);

    let gpt = report.data.iter().find(|g| g.model == "gpt-5-codex").unwrap();
    assert!((gpt.cost - 25.30).abs() < 1e-9, "gpt cost was {}", gpt.cost);

    assert_eq!(report.summary.total_sessions, 3);
    assert_eq!(
        report.summary.total_tokens,
        report.data.iter().map(|g| g.total_tokens).sum::<i64>()
    );
}

#[tokio::test]
async fn test_empty_directory_yields_empty_report() {
    let ws = Workspace::new().await;
    let report = ws.service().daily_usage(DateRangeFilter::new()).await.unwrap();
    assert!(report.data.is_empty());
    assert_eq!(report.summary.total_sessions, 0);
    assert_eq!(report.summary.total_tokens, 0);
    assert_eq!(report.summary.total_cost, 0.0);
    assert_eq!(report.summary.total_active_time, 0);
    assert_eq!(report.summary.total_prompts, 0);
}

#[tokio::test]
async fn test_missing_directory_is_fatal() {
    let service = UsageService::new(
        DataLoader::new("/definitely/not/a/real/sessions/dir"),
        PricingTable::builtin(),
    );
    let result = service.daily_usage(DateRangeFilter::new()).await;
    assert!(matches!(
        result,
        Err(DroidusageError::SessionsDirectory(_))
    ));
}

#[tokio::test]
async fn test_corrupt_settings_are_invisible_in_output() {
    let ws = Workspace::new().await;
    ws.write_settings("good", "zhipuai", "2024-05-01T08:00:00Z", 1000, 500, 0, 0)
        .await;
    write(&ws.sessions_dir, "broken.settings.json", "{ not json").await;

    let report = ws.service().daily_usage(DateRangeFilter::new()).await.unwrap();
    assert_eq!(report.summary.total_sessions, 1);
    assert!(report
        .data
        .iter()
        .all(|g| g.sessions.iter().all(|s| s.id.as_str() != "broken")));
}

#[tokio::test]
async fn test_session_usage_sorted_newest_first_with_undated_last() {
    let ws = Workspace::new().await;
    ws.write_settings("older", "zhipuai", "2024-05-01T08:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_settings("newer", "zhipuai", "2024-05-03T08:00:00Z", 100, 50, 0, 0)
        .await;
    // No timestamp at all: stays undated but still aggregates.
    write(
        &ws.sessions_dir,
        "undated.settings.json",
        r#"{"providerLock":"zhipuai","tokenUsage":{"inputTokens":5}}"#,
    )
    .await;

    let report = ws
        .service()
        .session_usage(DateRangeFilter::new())
        .await
        .unwrap();
    assert_eq!(report.data.len(), 3);
    assert_eq!(report.data[0].id.as_str(), "newer");
    assert_eq!(report.data[1].id.as_str(), "older");
    assert_eq!(report.data[2].id.as_str(), "undated");
}

#[tokio::test]
async fn test_date_filter_keeps_undated_sessions() {
    let ws = Workspace::new().await;
    ws.write_settings("in-range", "zhipuai", "2024-05-02T08:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_settings("out-of-range", "zhipuai", "2024-06-02T08:00:00Z", 100, 50, 0, 0)
        .await;
    write(
        &ws.sessions_dir,
        "undated.settings.json",
        r#"{"providerLock":"zhipuai","tokenUsage":{"inputTokens":5}}"#,
    )
    .await;

    let range = DateRangeFilter::new()
        .with_since(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        .with_until(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
    let report = ws.service().session_usage(range).await.unwrap();

    let ids: Vec<&str> = report.data.iter().map(|s| s.id.as_str()).collect();
    assert!(ids.contains(&"in-range"));
    assert!(ids.contains(&"undated"));
    assert!(!ids.contains(&"out-of-range"));
}

#[tokio::test]
async fn test_block_usage_window_assignment() {
    let ws = Workspace::new().await;
    ws.write_settings("h0", "zhipuai", "2024-05-01T00:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_settings("h4", "zhipuai", "2024-05-01T04:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_settings("h6", "zhipuai", "2024-05-01T06:00:00Z", 100, 50, 0, 0)
        .await;
    for id in ["h0", "h4", "h6"] {
        ws.write_transcript(id, 2).await;
    }

    let report = ws.service().block_usage(DateRangeFilter::new()).await.unwrap();
    assert_eq!(report.data.len(), 2);
    assert_eq!(report.data[0].sessions.len(), 2);
    assert_eq!(report.data[1].sessions.len(), 1);
    assert_eq!(report.data[0].time_range, "00:00 - 05:00");
    // Two genuine prompts per session; the reminder line never counts.
    assert_eq!(report.data[0].user_prompts, 4);
    assert_eq!(report.summary.total_prompts, 6);
}

#[tokio::test]
async fn test_top_sessions_by_cost() {
    let ws = Workspace::new().await;
    ws.write_settings("cheap", "zhipuai", "2024-05-01T08:00:00Z", 100_000, 50_000, 0, 0)
        .await;
    ws.write_settings(
        "pricey",
        "openai",
        "2024-05-01T09:00:00Z",
        2_000_000,
        1_000_000,
        0,
        0,
    )
    .await;
    ws.write_shared_log(concat!(
        r#"{"sessionId":"cheap","modelId":"glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"pricey","modelId":"gpt-5-codex"}"#,
        "\n",
    ))
    .await;

    let report = ws
        .service()
        .top_sessions(DateRangeFilter::new(), RankBy::Cost, 10)
        .await
        .unwrap();
    assert_eq!(report.data.len(), 2);
    assert_eq!(report.data[0].session.id.as_str(), "pricey");
    assert!(report.summary.total_cost > report.data[1].session.cost);
}

#[tokio::test]
async fn test_unknown_model_costs_zero() {
    let ws = Workspace::new().await;
    ws.write_settings("mystery", "zhipuai", "2024-05-01T08:00:00Z", 1_000_000, 500_000, 0, 0)
        .await;
    ws.write_shared_log(r#"{"sessionId":"mystery","modelId":"experimental-model-x"}"#)
        .await;

    let report = ws
        .service()
        .session_usage(DateRangeFilter::new())
        .await
        .unwrap();
    assert_eq!(report.data[0].model, "experimental-model-x");
    assert_eq!(report.data[0].cost, 0.0);
}

#[tokio::test]
async fn test_run_analysis_end_to_end() {
    let ws = Workspace::new().await;
    for (id, hour) in [("a", "08"), ("b", "09"), ("c", "10")] {
        ws.write_settings(
            id,
            "zhipuai",
            &format!("2024-05-01T{hour}:00:00Z"),
            500_000,
            250_000,
            0,
            0,
        )
        .await;
        ws.write_transcript(id, 3).await;
    }
    ws.write_shared_log(concat!(
        r#"{"sessionId":"a","modelId":"glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"b","modelId":"glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"c","modelId":"glm-4.6"}"#,
        "\n",
    ))
    .await;

    let report = ws
        .service()
        .run_analysis(DateRangeFilter::new(), AnalyzerSelection::all())
        .await
        .unwrap();

    assert_eq!(report.session_count, 3);
    assert_eq!(report.analyzers_run, ["cost", "patterns", "efficiency"]);
    assert!(report.results.cost.as_ref().unwrap().result.is_some());
    assert!(report.synthesized.key_metrics.avg_efficiency_score.is_some());
    assert!(!report.cross_insights.is_empty());
}

#[tokio::test]
async fn test_trends_analysis_with_empty_previous_period() {
    let ws = Workspace::new().await;
    // Undated sessions fall through every date filter, so the current
    // period sees them while the previous period has nothing dated.
    write(
        &ws.sessions_dir,
        "now.settings.json",
        r#"{"providerLock":"zhipuai","tokenUsage":{"inputTokens":1000,"outputTokens":500}}"#,
    )
    .await;

    let report = ws
        .service()
        .trends_analysis(DateRangeFilter::new())
        .await
        .unwrap();
    // Undated sessions pass both period filters; with no dated sessions in
    // the previous window the comparison still degenerates cleanly only
    // when the previous summary is empty, which it is not here. Assert the
    // shape rather than a direction.
    assert_eq!(report.current.total_sessions, 1);
    assert_eq!(report.trends.cost.value, report.current.total_cost);
}

#[tokio::test]
async fn test_models_and_providers_listing() {
    let ws = Workspace::new().await;
    ws.write_settings("a", "zhipuai", "2024-05-01T08:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_settings("b", "openai", "2024-05-01T09:00:00Z", 100, 50, 0, 0)
        .await;
    ws.write_shared_log(concat!(
        r#"{"sessionId":"a","modelId":"glm-4.6"}"#,
        "\n",
        r#"{"sessionId":"b","modelId":"gpt-4o"}"#,
        "\n",
    ))
    .await;

    let service = ws.service();
    assert_eq!(service.models().await.unwrap(), ["glm-4.6", "gpt-4o"]);
    assert_eq!(service.providers().await.unwrap(), ["openai", "zhipuai"]);
}
