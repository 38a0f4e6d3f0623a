//! A [`fks_quality::QualityScoreSink`] backed by the
//! `quality_scores` table.
//!
//! `QualityScoreSink::store` is synchronous (the collector's `check_quality`
//! is pure in-memory math), but persisting requires an async database
//! round trip. Mirroring the cache layer's "never block the hot path"
//! contract (`fks-cache`), the sink hands scores to an unbounded channel and
//! a dedicated background task performs the actual writes; a full channel
//! never happens (unbounded) and a closed receiver degrades to a dropped
//! write rather than a panic.

use fks_quality::QualityScoreSink;
use fks_types::{FksError, QualityScore};
use sqlx::PgPool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Non-blocking sink: `store` enqueues onto a channel drained by
/// [`spawn_writer`].
pub struct ChannelQualityScoreSink {
    tx: UnboundedSender<QualityScore>,
}

impl QualityScoreSink for ChannelQualityScoreSink {
    fn store(&self, score: &QualityScore) {
        // A dropped receiver (writer task gone) just means scores stop being
        // persisted; the collector's hot path never observes or blocks on it.
        let _ = self.tx.send(score.clone());
    }
}

/// Build a sink and its paired background writer. The writer runs until the
/// sink (and every clone of its sender) is dropped.
#[must_use]
pub fn spawn_writer(pool: PgPool) -> (ChannelQualityScoreSink, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(writer_loop(pool, rx));
    (ChannelQualityScoreSink { tx }, handle)
}

async fn writer_loop(pool: PgPool, mut rx: UnboundedReceiver<QualityScore>) {
    while let Some(score) = rx.recv().await {
        if let Err(_e) = store_score(&pool, &score).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(symbol = %score.symbol, error = %_e, "failed to persist quality score");
        }
    }
}

/// Persist one composite score row, keyed by `(time, symbol)`.
///
/// # Errors
/// Returns `FksError::Persistence` on a write failure.
pub async fn store_score(pool: &PgPool, score: &QualityScore) -> Result<(), FksError> {
    let component_scores = serde_json::to_value(score.components)
        .map_err(|e| FksError::Persistence(format!("serialize components: {e}")))?;
    let issues = serde_json::to_value(&score.issues)
        .map_err(|e| FksError::Persistence(format!("serialize issues: {e}")))?;
    let status = format!("{:?}", score.status).to_lowercase();
    sqlx::query(
        r"
        INSERT INTO quality_scores
            (time, symbol, overall, status, component_scores, issues, issue_count, check_duration_ms)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (time, symbol) DO UPDATE SET
            overall = EXCLUDED.overall,
            status = EXCLUDED.status,
            component_scores = EXCLUDED.component_scores,
            issues = EXCLUDED.issues,
            issue_count = EXCLUDED.issue_count
        ",
    )
    .bind(score.timestamp)
    .bind(&score.symbol)
    .bind(score.overall)
    .bind(status)
    .bind(component_scores)
    .bind(issues)
    .bind(score.issues.len() as i32)
    .bind(0.0_f64)
    .execute(pool)
    .await
    .map_err(|e| FksError::Persistence(format!("store_score: {e}")))?;
    Ok(())
}
