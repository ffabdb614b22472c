//! Batch session loader
//!
//! Drives the session reader across many session ids without holding every
//! transcript open at once: ids are partitioned into fixed-size batches and
//! each batch's sessions are read concurrently. The shared-log index is
//! built exactly once per invocation, shared read-only across all batches,
//! and dropped when the call returns so its memory is bounded to one call.
//!
//! Ids whose settings fail to parse are silently dropped from the result
//! (the reader logs the warning). The order of returned sessions is not
//! guaranteed to match the input order.

use crate::data_loader::DataLoader;
use crate::log_index::SharedLogIndex;
use crate::session_reader::SessionReader;
use crate::types::{Session, SessionId};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::debug;

/// Default number of sessions reconstructed concurrently per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Loads session populations in bounded concurrent batches
pub struct BatchSessionLoader {
    loader: Arc<DataLoader>,
    batch_size: usize,
    show_progress: bool,
}

impl BatchSessionLoader {
    /// Create a loader with the default batch size
    pub fn new(loader: Arc<DataLoader>) -> Self {
        Self {
            loader,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }

    /// Override the batch size (clamped to at least 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Enable or disable the progress spinner
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Reconstruct canonical sessions for the given ids.
    ///
    /// `count_prompts` is forwarded to the session reader; it is the most
    /// expensive part of a read and only block/ranking views need it.
    pub async fn load_sessions(&self, ids: &[SessionId], count_prompts: bool) -> Vec<Session> {
        // One pass over the shared log, reused by every batch below.
        let index = match self.loader.read_shared_log().await {
            Some(text) => SharedLogIndex::build(&text),
            None => SharedLogIndex::empty(),
        };
        debug!(
            "Loading {} sessions in batches of {} ({} indexed in shared log)",
            ids.len(),
            self.batch_size,
            index.session_count()
        );

        let progress = if self.show_progress {
            let pb = ProgressBar::new(ids.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:30}] {pos}/{len}")
                    .expect("static template is valid"),
            );
            pb.set_message("Reading sessions");
            Some(pb)
        } else {
            None
        };

        let reader = SessionReader::new(&self.loader);
        let mut sessions = Vec::with_capacity(ids.len());

        for batch in ids.chunks(self.batch_size) {
            let reads = batch
                .iter()
                .map(|id| reader.read(id, Some(&index), count_prompts));
            let results = join_all(reads).await;
            sessions.extend(results.into_iter().flatten());

            if let Some(ref pb) = progress {
                pb.inc(batch.len() as u64);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!("Loaded {} sessions", sessions.len()));
        }

        // `index` is dropped here: the cache is scoped to this call.
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{SETTINGS_SUFFIX, SHARED_LOG_FILE};
    use tempfile::TempDir;

    async fn write_sessions(dir: &std::path::Path, count: usize) -> Vec<SessionId> {
        let mut ids = Vec::new();
        for i in 0..count {
            let id = format!("session-{i:03}");
            let settings = format!(
                r#"{{"providerLock":"zhipuai","providerLockTimestamp":"2024-05-01T10:00:00Z","tokenUsage":{{"inputTokens":{},"outputTokens":10}}}}"#,
                i * 100
            );
            tokio::fs::write(dir.join(format!("{id}{SETTINGS_SUFFIX}")), settings)
                .await
                .unwrap();
            ids.push(SessionId::new(id));
        }
        ids
    }

    #[tokio::test]
    async fn test_batches_cover_all_ids() {
        let temp = TempDir::new().unwrap();
        let sessions_dir = temp.path().join("sessions");
        tokio::fs::create_dir_all(&sessions_dir).await.unwrap();
        let ids = write_sessions(&sessions_dir, 23).await;

        let loader = Arc::new(DataLoader::new(&sessions_dir));
        let batch = BatchSessionLoader::new(loader).with_batch_size(5);

        let sessions = batch.load_sessions(&ids, false).await;
        assert_eq!(sessions.len(), 23);
    }

    #[tokio::test]
    async fn test_corrupt_sessions_are_dropped_not_fatal() {
        let temp = TempDir::new().unwrap();
        let sessions_dir = temp.path().join("sessions");
        tokio::fs::create_dir_all(&sessions_dir).await.unwrap();
        let mut ids = write_sessions(&sessions_dir, 3).await;

        tokio::fs::write(
            sessions_dir.join(format!("broken{SETTINGS_SUFFIX}")),
            "{ nope",
        )
        .await
        .unwrap();
        ids.push(SessionId::new("broken"));
        ids.push(SessionId::new("missing"));

        let loader = Arc::new(DataLoader::new(&sessions_dir));
        let batch = BatchSessionLoader::new(loader);

        let sessions = batch.load_sessions(&ids, false).await;
        assert_eq!(sessions.len(), 3);
        assert!(sessions.iter().all(|s| s.id.as_str() != "broken"));
    }

    #[tokio::test]
    async fn test_shared_log_enriches_all_batches() {
        let temp = TempDir::new().unwrap();
        let sessions_dir = temp.path().join("sessions");
        let logs_dir = temp.path().join("logs");
        tokio::fs::create_dir_all(&sessions_dir).await.unwrap();
        tokio::fs::create_dir_all(&logs_dir).await.unwrap();
        let ids = write_sessions(&sessions_dir, 4).await;

        let log: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"{{"sessionId":"{}","modelId":"custom:glm-4.6","outputTokens":5000}}{}"#,
                    id.as_str(),
                    "\n"
                )
            })
            .collect();
        tokio::fs::write(logs_dir.join(SHARED_LOG_FILE), log)
            .await
            .unwrap();

        let loader = Arc::new(DataLoader::new(&sessions_dir));
        let batch = BatchSessionLoader::new(loader).with_batch_size(2);

        let sessions = batch.load_sessions(&ids, false).await;
        assert_eq!(sessions.len(), 4);
        assert!(sessions.iter().all(|s| s.model == "glm-4.6"));
        assert!(sessions.iter().all(|s| s.tokens.output_tokens == 5000));
    }
}
