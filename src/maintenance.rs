//! Periodic background jobs: TLE reload and stale observation cleanup.

use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::scheduler::{Observation, Storage, StorageError, VettedStatus};

const RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);
const RETRY_MAX_DELAY: std::time::Duration = std::time::Duration::from_secs(300);

/// Delay before retry number `attempt` (0-based): doubling from `base`,
/// capped at `max`.
pub fn backoff_delay(
    attempt: u32,
    base: std::time::Duration,
    max: std::time::Duration,
) -> std::time::Duration {
    base.checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .map_or(max, |d| d.min(max))
}

/// Run `op` until it succeeds or `attempts` tries have failed, sleeping with
/// exponential backoff in between. The last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    what: &str,
    attempts: u32,
    base: std::time::Duration,
    max: std::time::Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = backoff_delay(attempt, base, max);
                warn!("{} failed ({}), retrying in {:?}", what, e, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Unvetted observations that ended more than `old_range` ago. Vetted
/// observations are kept whatever their status.
pub fn stale_observations(
    observations: &[Observation],
    now: DateTime<Utc>,
    old_range: Duration,
) -> Vec<&Observation> {
    let threshold = now - old_range;
    observations
        .iter()
        .filter(|o| o.end < threshold && o.vetted_status == VettedStatus::Unknown)
        .collect()
}

/// Delete stale observations. Returns how many were removed.
pub fn clean_observations(
    storage: &Storage,
    now: DateTime<Utc>,
    old_range: Duration,
) -> Result<usize, StorageError> {
    let observations = storage.all_observations()?;
    let stale = stale_observations(&observations, now, old_range);
    for observation in &stale {
        storage.delete_observation(&observation.id)?;
    }
    Ok(stale.len())
}

pub fn spawn_tle_refresh(
    catalog: Arc<RwLock<Catalog>>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The catalog was loaded at startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let result = retry_with_backoff(
                "TLE reload",
                RETRY_ATTEMPTS,
                RETRY_BASE_DELAY,
                RETRY_MAX_DELAY,
                || {
                    let catalog = catalog.clone();
                    async move { catalog.write().await.reload_tles() }
                },
            )
            .await;
            match result {
                Ok(changed) => info!("Reloaded TLEs, {} element sets changed", changed),
                Err(e) => error!("Giving up on TLE reload: {}", e),
            }
        }
    })
}

pub fn spawn_cleanup(
    storage: Arc<Storage>,
    every: std::time::Duration,
    old_range: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let result = retry_with_backoff(
                "Observation cleanup",
                RETRY_ATTEMPTS,
                RETRY_BASE_DELAY,
                RETRY_MAX_DELAY,
                || {
                    let storage = storage.clone();
                    async move { clean_observations(&storage, Utc::now(), old_range) }
                },
            )
            .await;
            match result {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} stale observations", removed),
                Err(e) => error!("Giving up on observation cleanup: {}", e),
            }
        }
    })
}
