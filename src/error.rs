//! Error types for the PurpleAir writer.
//!
//! Only [`ValidationError`] is fatal, and only at startup. Everything else is
//! absorbed by the write pipeline into "skip this cycle" and surfaced through
//! logs and connection-tracker state.

use thiserror::Error;

/// Bad sensor address or malformed configuration. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("addr must be an IPv4 address or a PurpleAir hostname, got {0:?}")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The sensor could not be reached at the transport level.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot connect to {url}: {message}")]
    Transport { url: String, message: String },
}

/// A PM2.5 concentration fell outside the AQI breakpoint table.
#[derive(Debug, Error, PartialEq)]
pub enum AqiError {
    #[error("PM2.5 concentration {0} is outside the AQI breakpoint table")]
    OutOfRange(f64),
}

/// A raw reading could not be turned into a measurement or a point.
#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("sensor data is not a JSON object")]
    NotAnObject,

    #[error("no data in sensor results")]
    NoResults,

    #[error("sensor data is missing field {0:?}")]
    MissingField(&'static str),

    #[error("malformed Stats blob: {0}")]
    MalformedStats(#[from] serde_json::Error),

    #[error("invalid sensor timestamp: {0}")]
    InvalidTimestamp(String),

    #[error(transparent)]
    Computation(#[from] AqiError),
}

/// Errors from the time-series database collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// Malformed request (schema mismatch, bad line protocol). Never transient.
    #[error("InfluxDB client error (code: {code}): {message}")]
    Client { code: u16, message: String },

    #[error("InfluxDB server error (code: {code}): {message}")]
    Server { code: u16, message: String },

    #[error("InfluxDB transport error: {0}")]
    Transport(String),
}

impl DbError {
    /// Whether this error means the database link is down.
    pub fn is_connectivity(&self) -> bool {
        !matches!(self, DbError::Client { .. })
    }
}
