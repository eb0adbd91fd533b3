pub mod error;
pub mod observations;
pub mod passes;
pub mod satellites;
pub mod schedule;
pub mod stations;
