pub mod elements;
mod error;
mod ground_station;
pub mod look_angles;
mod pass_finder;
pub mod tle_loader;
mod types;
pub mod windows;

pub use elements::OrbitalElements;
pub use error::PredictError;
pub use ground_station::StationLocation;
pub use look_angles::{satellite_position, SubPoint};
pub use pass_finder::compute_passes;
pub use tle_loader::TleLoader;
pub use types::{PassEvent, PassReport, PolarPoint};
pub use windows::{
    generate_station_windows, generate_windows, upcoming_passes, CandidateWindow,
    FrequencyFilter, PassTarget, SearchWindow,
};
