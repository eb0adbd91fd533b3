use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::predict::PredictError;
use crate::scheduler::storage::StorageError;
use crate::station::{StationError, StationId};

#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Observation {start} - {end} on station {station} overlaps an existing observation")]
    Conflict {
        station: StationId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Observation {index} of the batch rejected: {source}")]
    Batch {
        index: usize,
        source: Box<SchedulingError>,
    },

    #[error("Invalid observation request: {0}")]
    InvalidRequest(String),

    #[error("Observation starting {start} is too soon, earliest start is {earliest}")]
    TooSoon {
        start: DateTime<Utc>,
        earliest: DateTime<Utc>,
    },

    #[error("Observation lasts {minutes} minutes, at most {max_minutes} allowed")]
    TooLong { minutes: i64, max_minutes: i64 },

    #[error("Station {0} is offline")]
    StationOffline(StationId),

    #[error("Not allowed to schedule on station {0}")]
    PermissionDenied(StationId),

    #[error("Unknown station: {0}")]
    UnknownStation(StationId),

    #[error("Unknown or unschedulable satellite: {0}")]
    UnknownSatellite(u32),

    #[error("Unknown or dead transmitter: {0}")]
    UnknownTransmitter(String),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<StationError> for SchedulingError {
    fn from(e: StationError) -> Self {
        match e {
            StationError::Unknown(id) => SchedulingError::UnknownStation(id),
        }
    }
}

impl SchedulingError {
    pub fn in_batch(self, index: usize) -> Self {
        SchedulingError::Batch {
            index,
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping batch positions.
    pub fn root(&self) -> &SchedulingError {
        match self {
            SchedulingError::Batch { source, .. } => source.root(),
            other => other,
        }
    }
}
