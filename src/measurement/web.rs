//! Measurement from the public PurpleAir JSON API.
//!
//! The web payload carries one object per channel under `results`. Channel A
//! holds the device metadata; channel B is absent on single-channel devices.
//! Most numbers arrive as strings and are coerced on access.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{coerce_f64, coerce_i64, coerce_text, rounded_aqi, Measurement, Particulate};
use super::{AQI_EPA_KEY, EPA_CORRECTION_KEY};
use crate::error::MeasurementError;
use crate::point::{Point, TagValue};

// ---

/// The nested `Stats` blob, itself JSON-encoded inside a string.
#[derive(Debug, Clone, Deserialize)]
struct ChannelStats {
    #[serde(rename = "lastModified")]
    last_modified: i64,
}

#[derive(Debug, Clone)]
pub struct WebMeasurement {
    channel_a: Map<String, Value>,
    channel_b: Option<Map<String, Value>>,
    timestamp: DateTime<Utc>,
}

fn channel_object(value: &Value) -> Result<Map<String, Value>, MeasurementError> {
    value
        .as_object()
        .cloned()
        .ok_or(MeasurementError::NotAnObject)
}

fn parse_stats(channel: &Map<String, Value>) -> Result<ChannelStats, MeasurementError> {
    let raw = channel
        .get("Stats")
        .and_then(Value::as_str)
        .ok_or(MeasurementError::MissingField("Stats"))?;
    Ok(serde_json::from_str(raw)?)
}

impl WebMeasurement {
    /// Build from the full API response.
    ///
    /// # Errors
    /// [`MeasurementError::NoResults`] when `results` is missing or empty, and
    /// a stats error when a channel's `Stats` blob is absent or malformed.
    pub fn new(sensor_data: &Value) -> Result<Self, MeasurementError> {
        // ---
        let results = sensor_data
            .get("results")
            .and_then(Value::as_array)
            .filter(|results| !results.is_empty())
            .ok_or(MeasurementError::NoResults)?;

        let channel_a = channel_object(&results[0])?;
        let stats = parse_stats(&channel_a)?;
        let timestamp = DateTime::from_timestamp_millis(stats.last_modified).ok_or_else(|| {
            MeasurementError::InvalidTimestamp(format!("lastModified {}", stats.last_modified))
        })?;

        let channel_b = match results.get(1) {
            Some(value) => {
                let channel = channel_object(value)?;
                parse_stats(&channel)?;
                Some(channel)
            }
            None => {
                tracing::debug!("Only one channel of data present.");
                None
            }
        };

        Ok(Self {
            channel_a,
            channel_b,
            timestamp,
        })
    }

    pub fn has_channel_b(&self) -> bool {
        self.channel_b.is_some()
    }

    fn a(&self, key: &str) -> Option<&Value> {
        self.channel_a.get(key)
    }

    fn b(&self, key: &str) -> Option<&Value> {
        self.channel_b.as_ref().and_then(|channel| channel.get(key))
    }

    pub fn sensor_id(&self) -> Option<String> {
        coerce_text(self.a("ID"))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn label(&self) -> Option<String> {
        coerce_text(self.a("Label"))
    }

    pub fn hidden(&self) -> Option<bool> {
        match self.a("Hidden")? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    pub fn lat(&self) -> Option<f64> {
        coerce_f64(self.a("Lat"))
    }

    pub fn lon(&self) -> Option<f64> {
        coerce_f64(self.a("Lon"))
    }

    pub fn place(&self) -> Option<String> {
        coerce_text(self.a("DEVICE_LOCATIONTYPE"))
    }

    pub fn rssi(&self) -> Option<i64> {
        coerce_i64(self.a("RSSI"))
    }

    pub fn uptime(&self) -> Option<i64> {
        coerce_i64(self.a("Uptime"))
    }

    pub fn temp_f(&self) -> Option<i64> {
        coerce_i64(self.a("temp_f"))
    }

    pub fn humidity(&self) -> Option<f64> {
        coerce_i64(self.a("humidity")).map(|h| h as f64)
    }

    pub fn pressure(&self) -> Option<f64> {
        coerce_f64(self.a("pressure"))
    }

    /// AQI of channel A's `PM2_5Value`.
    pub fn pm2_5_aqi(&self) -> Result<Option<i64>, MeasurementError> {
        coerce_f64(self.a("PM2_5Value")).map(rounded_aqi).transpose()
    }

    pub fn pm2_5_aqi_b(&self) -> Result<Option<i64>, MeasurementError> {
        coerce_f64(self.b("PM2_5Value")).map(rounded_aqi).transpose()
    }

    pub fn channel_a(&self, particulate: Particulate) -> Option<f64> {
        coerce_f64(self.a(particulate.key()))
    }

    pub fn channel_b(&self, particulate: Particulate) -> Option<f64> {
        coerce_f64(self.b(particulate.key()))
    }

    pub(super) fn prepare_for_point(
        &self,
        measurement: &Measurement,
    ) -> Result<Point, MeasurementError> {
        // ---
        let mut point = Point::new(self.timestamp);

        point.tag("sensor_id", self.a("ID").and_then(TagValue::from_json));
        point.tag("label", self.label());
        point.tag("lat", self.lat());
        point.tag("lon", self.lon());
        point.tag("hidden", self.hidden());

        if self.has_channel_b() {
            for particulate in Particulate::ALL {
                point.field(particulate.key(), self.channel_a(particulate));
                point.field(particulate.key_b(), self.channel_b(particulate));
            }
            point.field("pm2.5_aqi", self.pm2_5_aqi()?);
            point.field("pm2.5_aqi_b", self.pm2_5_aqi_b()?);
            point.field("temp_f", self.temp_f());
            point.field("pressure", self.pressure());
            // Integer on the wire; existing `sensors` series store it that way.
            point.field("humidity", coerce_i64(self.a("humidity")));
            point.field("rssi", self.rssi());
            point.field("uptime", self.uptime());

            point.tag("place", self.place());
            point.tag("version", coerce_text(self.a("Version")));
            point.tag(
                "hardwarediscovered",
                coerce_text(self.a("DEVICE_HARDWAREDISCOVERED")),
            );
            point.tag("type", coerce_text(self.a("Type")));
        } else {
            // Single-channel devices are stored under the channel B schema so
            // existing series stay compatible.
            for particulate in Particulate::ALL {
                point.field(particulate.key_b(), self.channel_a(particulate));
            }
            point.field("pm2.5_aqi_b", self.pm2_5_aqi()?);
        }

        point.field(EPA_CORRECTION_KEY, measurement.pm2_5_epa_correction());
        point.field(AQI_EPA_KEY, measurement.pm2_5_aqi_epa()?);

        Ok(point)
    }
}
