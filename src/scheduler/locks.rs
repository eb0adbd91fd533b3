use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::station::StationId;

/// One mutex per station, so concurrent batches on disjoint stations never
/// wait on each other.
#[derive(Default)]
pub struct StationLocks {
    locks: Mutex<HashMap<StationId, Arc<Mutex<()>>>>,
}

/// Station mutexes in ascending id order. Lock them with
/// [`StationHandles::lock`]; holding the guards serializes the stations.
pub struct StationHandles(Vec<Arc<Mutex<()>>>);

impl StationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(&self, stations: &[StationId]) -> StationHandles {
        let mut ids = stations.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        StationHandles(
            ids.into_iter()
                .map(|id| locks.entry(id).or_default().clone())
                .collect(),
        )
    }
}

impl StationHandles {
    /// Acquire every lock, always in ascending station order.
    pub fn lock(&self) -> Vec<MutexGuard<'_, ()>> {
        self.0
            .iter()
            .map(|m| m.lock().unwrap_or_else(|e| e.into_inner()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_station_is_serialized() {
        let locks = Arc::new(StationLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    // Different orders and duplicates still share station 7.
                    let ids = if i % 2 == 0 { vec![7, 3] } else { vec![3, 7, 7] };
                    let handles = locks.handles(&ids);
                    let _guards = handles.lock();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disjoint_stations_do_not_block() {
        let locks = StationLocks::new();
        let first = locks.handles(&[1]);
        let _held = first.lock();
        let second = locks.handles(&[2]);
        assert!(second.0[0].try_lock().is_ok());
        assert!(locks.handles(&[1]).0[0].try_lock().is_err());
    }
}
