//! The poll-and-write pipeline.
//!
//! One cycle runs: fetch → validate → normalize → write. Each boundary feeds
//! a [`ConnectionTracker`] so that only state changes are logged:
//!
//! - sensor link: transport failures fetching the sensor
//! - sensor data: "nan" warm-up readings and empty web results
//! - database link: InfluxDB server and transport errors
//!
//! InfluxDB client errors (malformed writes) are logged every time and never
//! counted as an outage; they point at a schema bug, not a network problem.
//!
//! The tracker states live in [`LinkStates`], owned by the caller and passed
//! into each call, so a cycle is a function of the raw reading and the
//! current states.

use std::slice;

use tracing::{debug, error, info};

use crate::connection::{ConnectionTracker, Link};
use crate::error::DbError;
use crate::influx::TimeSeriesDb;
use crate::point::{Point, Precision};
use crate::sensor::{Fetch, Sensor};

// ---

/// Timestamps are written with millisecond precision.
pub const TIME_PRECISION: Precision = Precision::Milliseconds;

/// Connection state for every link the pipeline watches.
#[derive(Debug, Clone)]
pub struct LinkStates {
    pub sensor: ConnectionTracker,
    pub data: ConnectionTracker,
    pub database: ConnectionTracker,
    first_write_pending: bool,
}

impl LinkStates {
    pub fn new(sensor: &Sensor) -> Self {
        Self {
            sensor: ConnectionTracker::new(Link::Sensor(sensor.label())),
            data: ConnectionTracker::new(Link::SensorData(sensor.label())),
            database: ConnectionTracker::new(Link::Database),
            first_write_pending: true,
        }
    }

    pub fn first_write_pending(&self) -> bool {
        self.first_write_pending
    }
}

/// How a poll cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The point was written.
    Written,
    /// The sensor could not be reached.
    SensorUnreachable,
    /// The sensor answered with a non-200 status or a body that is not JSON.
    NoResponse,
    /// The reading holds no usable data yet.
    NoData,
    /// The reading could not be normalized.
    Invalid,
    /// InfluxDB rejected the write as malformed.
    WriteRejected,
    /// InfluxDB was unreachable or failed server-side.
    WriteFailed,
}

/// Feed a database error into the tracker and log it. Returns whether the
/// error was logged at ERROR.
///
/// Client errors are always logged; connectivity errors only on the
/// transition to disconnected.
fn report_db_error(err: &DbError, states: &mut LinkStates) -> bool {
    // ---
    if err.is_connectivity() {
        if states.database.report_and_log(false) {
            error!("{}", err);
            true
        } else {
            debug!("InfluxDB still unreachable: {}", err);
            false
        }
    } else {
        states.database.report_and_log(true);
        error!("{}", err);
        true
    }
}

/// Make sure `database` exists and make it the active one.
///
/// Returns `false` if InfluxDB could not be asked or the database could not
/// be created; the caller retries at its own pace.
pub async fn init_database<D>(db: &mut D, database: &str, states: &mut LinkStates) -> bool
where
    D: TimeSeriesDb + ?Sized,
{
    // ---
    let names = match db.list_databases().await {
        Ok(names) => {
            states.database.report_and_log(true);
            names
        }
        Err(e) => {
            report_db_error(&e, states);
            debug!("Cannot fetch database names.");
            return false;
        }
    };

    if !names.iter().any(|name| name == database) {
        info!("Creating database: {:?}", database);
        if let Err(e) = db.create_database(database).await {
            report_db_error(&e, states);
            error!("Cannot create database: {}", database);
            return false;
        }
        states.database.report_and_log(true);
    }

    info!("Using database: {:?}", database);
    db.switch_database(database);
    true
}

/// Write one point, feeding the outcome to the database tracker.
pub async fn write_point<D>(
    db: &D,
    database: &str,
    point: &Point,
    states: &mut LinkStates,
) -> CycleOutcome
where
    D: TimeSeriesDb + ?Sized,
{
    // ---
    let first = states.first_write_pending;
    if first {
        // The first successful write always gets one confirmation line.
        states.database.force_disconnected();
        states.first_write_pending = false;
    }

    match db
        .write_points(slice::from_ref(point), TIME_PRECISION, database)
        .await
    {
        Ok(()) => {
            states.database.report_and_log(true);
            debug!("Wrote {} point at {}", point.measurement, point.timestamp());
            CycleOutcome::Written
        }
        Err(e) if !e.is_connectivity() => {
            report_db_error(&e, states);
            error!("Failed to write sensor measurement to InfluxDB.");
            CycleOutcome::WriteRejected
        }
        Err(e) => {
            report_db_error(&e, states);
            if first {
                error!("First write to InfluxDB failed: {}", e);
            }
            CycleOutcome::WriteFailed
        }
    }
}

/// Run one poll cycle: query the sensor and write the reading.
pub async fn run_cycle<F, D>(
    sensor: &Sensor,
    fetcher: &F,
    db: &D,
    database: &str,
    states: &mut LinkStates,
) -> CycleOutcome
where
    F: Fetch + ?Sized,
    D: TimeSeriesDb + ?Sized,
{
    // ---
    let raw = match sensor.query(fetcher).await {
        Ok(raw) => {
            states.sensor.report_and_log(true);
            raw
        }
        Err(e) => {
            if states.sensor.report_and_log(false) {
                error!("{}", e);
            }
            return CycleOutcome::SensorUnreachable;
        }
    };

    let Some(raw) = raw else {
        return CycleOutcome::NoResponse;
    };

    if !sensor.validity_check(&raw) {
        states.data.report_and_log(false);
        return CycleOutcome::NoData;
    }

    let measurement = match sensor.to_measurement(&raw) {
        Ok(measurement) => measurement,
        Err(e) => {
            error!("Cannot read sensor measurement: {}", e);
            return CycleOutcome::Invalid;
        }
    };

    let point = match measurement.prepare_for_point() {
        Ok(Some(point)) => point,
        Ok(None) => {
            states.data.report_and_log(false);
            return CycleOutcome::NoData;
        }
        Err(e) => {
            error!("Cannot prepare sensor measurement: {}", e);
            return CycleOutcome::Invalid;
        }
    };
    states.data.report_and_log(true);

    let point = point.with_measurement(sensor.series_name());
    write_point(db, database, &point, states).await
}

// ---

/// A sensor, its collaborators, and the link states, owned together by the
/// polling loop.
pub struct WritePipeline<F, D> {
    sensor: Sensor,
    fetcher: F,
    db: D,
    database: String,
    states: LinkStates,
}

impl<F, D> WritePipeline<F, D>
where
    F: Fetch,
    D: TimeSeriesDb,
{
    // ---
    pub fn new(sensor: Sensor, fetcher: F, db: D, database: &str) -> Self {
        let states = LinkStates::new(&sensor);
        Self {
            sensor,
            fetcher,
            db,
            database: database.to_string(),
            states,
        }
    }

    pub fn sensor(&self) -> &Sensor {
        &self.sensor
    }

    pub fn states(&self) -> &LinkStates {
        &self.states
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    /// Ensure the target database exists. See [`init_database`].
    pub async fn bootstrap(&mut self) -> bool {
        init_database(&mut self.db, &self.database, &mut self.states).await
    }

    /// Run one cycle. See [`run_cycle`].
    pub async fn poll(&mut self) -> CycleOutcome {
        run_cycle(
            &self.sensor,
            &self.fetcher,
            &self.db,
            &self.database,
            &mut self.states,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::connection::ConnectionState;

    #[test]
    fn test_link_states_start_connected() {
        // ---
        let states = LinkStates::new(&Sensor::web(14633));
        assert_eq!(states.sensor.state(), ConnectionState::Connected);
        assert_eq!(states.data.state(), ConnectionState::Connected);
        assert_eq!(states.database.state(), ConnectionState::Connected);
        assert!(states.first_write_pending());
        assert_eq!(
            states.sensor.link(),
            &Link::Sensor("purpleair.com".to_string())
        );
    }

    #[test]
    fn test_client_errors_are_logged_every_time() {
        // ---
        let mut states = LinkStates::new(&Sensor::web(14633));
        let err = DbError::Client {
            code: 400,
            message: "field type conflict".to_string(),
        };

        for _ in 0..3 {
            assert!(report_db_error(&err, &mut states));
            assert!(states.database.is_connected());
        }
    }

    #[test]
    fn test_connectivity_errors_are_logged_once() {
        // ---
        let mut states = LinkStates::new(&Sensor::web(14633));
        let err = DbError::Transport("connection refused".to_string());

        assert!(report_db_error(&err, &mut states));
        assert!(!report_db_error(&err, &mut states));
        assert!(!report_db_error(&err, &mut states));
        assert_eq!(states.database.state(), ConnectionState::Disconnected);
    }
}
