//! Measurement from a sensor's local `/json` endpoint.
//!
//! The LAN payload is one flat JSON object with both channels side by side
//! (`pm2_5_atm`, `pm2_5_atm_b`, ...). During the sensor's boot phase the
//! particulate readings are the string `"nan"`; such a reading is treated as
//! "no data", never as zeroes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use super::{coerce_f64, coerce_i64, coerce_text, Measurement, Particulate};
use super::{AQI_EPA_KEY, EPA_CORRECTION_KEY};
use crate::error::MeasurementError;
use crate::point::{FieldValue, Point, TagValue};

// ---

/// Raw keys copied verbatim into point tags.
const TAG_KEYS: [&str; 9] = [
    "SensorId",
    "Geo",
    "ssid",
    "lat",
    "lon",
    "place",
    "version",
    "hardwareversion",
    "hardwarediscovered",
];

/// `p*` keys that are not measurements.
const NON_FIELD_P_KEYS: [&str; 3] = ["pa_latency", "period", "place"];

/// Placeholder for particulate values before the sensor has warmed up.
const NAN_SENTINEL: &str = "nan";

/// Firmware format, e.g. `2020/08/23T10:44:25z`.
const DATETIME_FORMAT: &str = "%Y/%m/%dT%H:%M:%SZ";

#[derive(Debug, Clone)]
pub struct LanMeasurement {
    data: Map<String, Value>,
}

/// Whether any particulate reading still holds the warm-up sentinel.
///
/// Only `p_*` and `pm*` keys are checked; `Adc` takes much longer to
/// initialize after boot and is not a particulate reading.
pub fn has_nan_sentinel(data: &Map<String, Value>) -> bool {
    data.iter()
        .filter(|(key, _)| key.starts_with("p_") || key.starts_with("pm"))
        .any(|(_, value)| value.as_str() == Some(NAN_SENTINEL))
}

impl LanMeasurement {
    // ---
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        !has_nan_sentinel(&self.data)
    }

    pub fn sensor_id(&self) -> Option<String> {
        coerce_text(self.data.get("SensorId"))
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, MeasurementError> {
        // ---
        let raw = self
            .data
            .get("DateTime")
            .and_then(Value::as_str)
            .ok_or(MeasurementError::MissingField("DateTime"))?;

        NaiveDateTime::parse_from_str(&raw.to_uppercase(), DATETIME_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| MeasurementError::InvalidTimestamp(format!("{raw:?}: {e}")))
    }

    pub fn lat(&self) -> Option<f64> {
        coerce_f64(self.data.get("lat"))
    }

    pub fn lon(&self) -> Option<f64> {
        coerce_f64(self.data.get("lon"))
    }

    pub fn place(&self) -> Option<String> {
        coerce_text(self.data.get("place"))
    }

    pub fn rssi(&self) -> Option<i64> {
        coerce_i64(self.data.get("rssi"))
    }

    pub fn uptime(&self) -> Option<i64> {
        coerce_i64(self.data.get("uptime"))
    }

    pub fn temp_f(&self) -> Option<i64> {
        coerce_i64(self.data.get("current_temp_f"))
    }

    pub fn humidity(&self) -> Option<f64> {
        coerce_f64(self.data.get("current_humidity"))
    }

    pub fn dew_point_f(&self) -> Option<i64> {
        coerce_i64(self.data.get("current_dewpoint_f"))
    }

    pub fn pressure(&self) -> Option<f64> {
        coerce_f64(self.data.get("pressure"))
    }

    /// AQI as computed by the sensor firmware.
    pub fn pm2_5_aqi(&self) -> Option<i64> {
        coerce_i64(self.data.get("pm2.5_aqi"))
    }

    pub fn pm2_5_aqi_b(&self) -> Option<i64> {
        coerce_i64(self.data.get("pm2.5_aqi_b"))
    }

    pub fn channel_a(&self, particulate: Particulate) -> Option<f64> {
        coerce_f64(self.data.get(particulate.key()))
    }

    pub fn channel_b(&self, particulate: Particulate) -> Option<f64> {
        coerce_f64(self.data.get(particulate.key_b()))
    }

    pub(super) fn prepare_for_point(
        &self,
        measurement: &Measurement,
    ) -> Result<Option<Point>, MeasurementError> {
        // ---
        if !self.is_valid() {
            return Ok(None);
        }

        let mut point = Point::new(self.timestamp()?);

        for key in TAG_KEYS {
            point.tag(key, self.data.get(key).and_then(TagValue::from_json));
        }

        for (key, value) in &self.data {
            let is_field = key.starts_with("current")
                || (key.starts_with('p') && !NON_FIELD_P_KEYS.contains(&key.as_str()))
                || key == "rssi"
                || key == "uptime";
            if is_field {
                point.field(key, FieldValue::from_json(value));
            }
        }

        point.field(EPA_CORRECTION_KEY, measurement.pm2_5_epa_correction());
        point.field(AQI_EPA_KEY, measurement.pm2_5_aqi_epa()?);

        Ok(Some(point))
    }
}
