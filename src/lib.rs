//! Poll a PurpleAir air-quality sensor and write its readings to InfluxDB.
//!
//! Data flows one way: [`sensor::Sensor`] → [`measurement::Measurement`] →
//! [`point::Point`] → [`influx::TimeSeriesDb`]. The [`pipeline`] module runs
//! that flow once per poll and decides, through the edge-triggered trackers in
//! [`connection`], which failures are worth a log line.
//!
//! The binary in `main.rs` only wires configuration, logging and the polling
//! loop around this library.

pub mod aqi;
pub mod config;
pub mod connection;
pub mod error;
pub mod influx;
pub mod measurement;
pub mod pipeline;
pub mod point;
pub mod sensor;

pub use config::Config;
pub use error::{AqiError, DbError, FetchError, MeasurementError, ValidationError};
pub use measurement::Measurement;
pub use pipeline::{CycleOutcome, LinkStates, WritePipeline};
pub use point::Point;
pub use sensor::Sensor;
