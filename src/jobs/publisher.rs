//! Promotes due scheduled posts to published.
//!
//! The sweep runs two ways: a periodic task owned by [`Publisher`], and
//! inline at the top of every post listing so a post due between ticks
//! is never served as still scheduled. Both paths share
//! [`promote_due`]; the `WHERE status = 'scheduled'` predicate makes
//! concurrent sweeps race-free: the second one matches zero rows.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::infra::db::Db;

/// Publish every post whose scheduled time has passed, in one
/// conditional bulk update. Returns the number of rows promoted.
/// Comparing against the database's own now() keeps the decision and
/// the write in a single statement.
pub async fn promote_due(db: &Db) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE posts \
         SET status = 'published', updated_at = now() \
         WHERE status = 'scheduled' AND scheduled_at <= now()",
    )
    .execute(db.pool())
    .await?;
    Ok(result.rows_affected())
}

/// Run one sweep, swallowing failures. A failed sweep only means the
/// promotion happens on the next tick or the next list request, so
/// neither caller wants the error.
pub async fn sweep(db: &Db) {
    match promote_due(db).await {
        Ok(0) => {}
        Ok(promoted) => info!(promoted, "published due scheduled posts"),
        Err(err) => warn!(error = ?err, "scheduled publish sweep failed"),
    }
}

/// The periodic half of the publisher: a long-lived task constructed at
/// process start, sweeping on a fixed interval for the lifetime of the
/// process.
pub struct Publisher {
    db: Db,
    interval: Duration,
}

impl Publisher {
    pub fn new(db: Db, interval: Duration) -> Self {
        Self { db, interval }
    }

    pub fn start(self) -> PublisherHandle {
        let handle = tokio::spawn(async move {
            info!(interval_seconds = self.interval.as_secs(), "publisher started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep(&self.db).await;
            }
        });
        PublisherHandle { handle }
    }
}

/// Owns the running publisher task. Dropping the handle leaves the task
/// running; `stop` tears it down. An in-flight sweep may be abandoned;
/// whatever it would have promoted is picked up by the next start.
pub struct PublisherHandle {
    handle: JoinHandle<()>,
}

impl PublisherHandle {
    pub fn stop(self) {
        self.handle.abort();
    }
}
