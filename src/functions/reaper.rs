use crate::services::{JobStore, remove_snapshot};
use chrono::{TimeDelta, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const SNAPSHOT_EXPIRED: &str = "Repository snapshot expired";

/// Removes snapshots of finished jobs idle for longer than `ttl`. Returns how many were reclaimed.
pub async fn sweep_expired(store: &dyn JobStore, ttl: Duration) -> usize {
    let Ok(ttl) = TimeDelta::from_std(ttl) else {
        return 0;
    };
    let cutoff = Utc::now() - ttl;

    let mut reclaimed = 0;
    for candidate in store.list() {
        if !candidate.status.is_terminal() || candidate.repo_path.is_none() || candidate.updated_at >= cutoff {
            continue;
        }

        let mut expired: Option<PathBuf> = None;
        // conditions are re-checked under the store lock; the job may have been re-armed since listing
        let outcome = store.update(&candidate.job_id, &mut |job| {
            if job.status.is_terminal() && job.updated_at < cutoff {
                expired = job.take_snapshot();
                if expired.is_some() {
                    job.set_message(SNAPSHOT_EXPIRED);
                }
            }
            Ok(())
        });
        if let Err(e) = outcome {
            tracing::warn!(job_id = %candidate.job_id, error = %e, "failed to expire snapshot");
            continue;
        }

        if let Some(path) = expired {
            tracing::info!(job_id = %candidate.job_id, "reclaiming idle repository snapshot");
            remove_snapshot(&path).await;
            reclaimed += 1;
        }
    }
    reclaimed
}

/// Detaches and deletes every snapshot still held by a job.
pub async fn remove_all_snapshots(store: &dyn JobStore) -> usize {
    let mut removed = 0;
    for job in store.list() {
        let mut held = None;
        let _ = store.update(&job.job_id, &mut |job| {
            held = job.take_snapshot();
            Ok(())
        });
        if let Some(path) = held {
            remove_snapshot(&path).await;
            removed += 1;
        }
    }
    removed
}

pub async fn run_reaper(
    store: Arc<dyn JobStore>,
    ttl: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(ttl_secs = ttl.as_secs(), interval_secs = interval.as_secs(), "snapshot reaper started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {
                let reclaimed = sweep_expired(store.as_ref(), ttl).await;
                if reclaimed > 0 {
                    tracing::info!(reclaimed, "snapshot sweep finished");
                }
            }
        }
    }
    tracing::info!("snapshot reaper stopped");
}
