pub mod arbiter;
mod error;
pub mod interval;
mod locks;
pub mod observation;
pub mod service;
pub mod stats;
pub mod storage;

pub use arbiter::{BookableWindow, ObservationRequest, ScheduleLimits};
pub use error::SchedulingError;
pub use locks::StationLocks;
pub use observation::{Observation, VettedStatus};
pub use service::{BatchRequest, PassQuery, StationWindows};
pub use stats::{SatelliteStats, StationStats};
pub use storage::{Storage, StorageError};
