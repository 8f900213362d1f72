//! Canonical measurement view over a raw PurpleAir reading.
//!
//! A [`Measurement`] wraps exactly one raw JSON reading, either from a sensor
//! on the local network ([`LanMeasurement`]) or from the public web API
//! ([`WebMeasurement`]). Both expose the same accessor set plus the derived
//! EPA values, and both serialize into a [`Point`] via
//! [`Measurement::prepare_for_point`].
//!
//! Measurements are immutable: querying the sensor again yields a new one.

mod lan;
mod web;

pub use lan::{has_nan_sentinel, LanMeasurement};
pub use web::WebMeasurement;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::aqi;
use crate::error::MeasurementError;
use crate::point::Point;

// ---

/// Field key for the EPA-corrected PM2.5 concentration.
pub const EPA_CORRECTION_KEY: &str = "pm2.5_epa_correction";

/// Field key for the AQI of the EPA-corrected concentration.
pub const AQI_EPA_KEY: &str = "pm2.5_aqi_epa";

/// The particulate and mass readings each sensor channel reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Particulate {
    /// ATM PM1.0 particulate mass in µg/m³
    Pm1_0Atm,
    /// ATM PM2.5 particulate mass in µg/m³
    Pm2_5Atm,
    /// ATM PM10.0 particulate mass in µg/m³
    Pm10_0Atm,
    /// CF=1 PM1.0 particulate mass in µg/m³
    Pm1_0Cf1,
    /// CF=1 PM2.5 particulate mass in µg/m³
    Pm2_5Cf1,
    /// CF=1 PM10.0 particulate mass in µg/m³
    Pm10_0Cf1,
    /// 0.3 µm particle counts per deciliter of air
    P0_3Um,
    /// 0.5 µm particle counts per deciliter of air
    P0_5Um,
    /// 1.0 µm particle counts per deciliter of air
    P1_0Um,
    /// 2.5 µm particle counts per deciliter of air
    P2_5Um,
    /// 5.0 µm particle counts per deciliter of air
    P5_0Um,
    /// 10.0 µm particle counts per deciliter of air
    P10_0Um,
}

impl Particulate {
    pub const ALL: [Particulate; 12] = [
        Particulate::Pm1_0Atm,
        Particulate::Pm2_5Atm,
        Particulate::Pm10_0Atm,
        Particulate::Pm1_0Cf1,
        Particulate::Pm2_5Cf1,
        Particulate::Pm10_0Cf1,
        Particulate::P0_3Um,
        Particulate::P0_5Um,
        Particulate::P1_0Um,
        Particulate::P2_5Um,
        Particulate::P5_0Um,
        Particulate::P10_0Um,
    ];

    /// Raw key for channel A.
    pub fn key(self) -> &'static str {
        match self {
            Particulate::Pm1_0Atm => "pm1_0_atm",
            Particulate::Pm2_5Atm => "pm2_5_atm",
            Particulate::Pm10_0Atm => "pm10_0_atm",
            Particulate::Pm1_0Cf1 => "pm1_0_cf_1",
            Particulate::Pm2_5Cf1 => "pm2_5_cf_1",
            Particulate::Pm10_0Cf1 => "pm10_0_cf_1",
            Particulate::P0_3Um => "p_0_3_um",
            Particulate::P0_5Um => "p_0_5_um",
            Particulate::P1_0Um => "p_1_0_um",
            Particulate::P2_5Um => "p_2_5_um",
            Particulate::P5_0Um => "p_5_0_um",
            Particulate::P10_0Um => "p_10_0_um",
        }
    }

    /// Key for channel B, used both in LAN raw data and in the point schema.
    pub fn key_b(self) -> &'static str {
        match self {
            Particulate::Pm1_0Atm => "pm1_0_atm_b",
            Particulate::Pm2_5Atm => "pm2_5_atm_b",
            Particulate::Pm10_0Atm => "pm10_0_atm_b",
            Particulate::Pm1_0Cf1 => "pm1_0_cf_1_b",
            Particulate::Pm2_5Cf1 => "pm2_5_cf_1_b",
            Particulate::Pm10_0Cf1 => "pm10_0_cf_1_b",
            Particulate::P0_3Um => "p_0_3_um_b",
            Particulate::P0_5Um => "p_0_5_um_b",
            Particulate::P1_0Um => "p_1_0_um_b",
            Particulate::P2_5Um => "p_2_5_um_b",
            Particulate::P5_0Um => "p_5_0_um_b",
            Particulate::P10_0Um => "p_10_0_um_b",
        }
    }
}

// ---

/// One sensor reading, normalized.
#[derive(Debug, Clone)]
pub enum Measurement {
    Lan(LanMeasurement),
    Web(WebMeasurement),
}

impl Measurement {
    // ---
    pub fn sensor_id(&self) -> Option<String> {
        match self {
            Measurement::Lan(m) => m.sensor_id(),
            Measurement::Web(m) => m.sensor_id(),
        }
    }

    pub fn timestamp(&self) -> Result<DateTime<Utc>, MeasurementError> {
        match self {
            Measurement::Lan(m) => m.timestamp(),
            Measurement::Web(m) => Ok(m.timestamp()),
        }
    }

    pub fn lat(&self) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.lat(),
            Measurement::Web(m) => m.lat(),
        }
    }

    pub fn lon(&self) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.lon(),
            Measurement::Web(m) => m.lon(),
        }
    }

    pub fn place(&self) -> Option<String> {
        match self {
            Measurement::Lan(m) => m.place(),
            Measurement::Web(m) => m.place(),
        }
    }

    pub fn rssi(&self) -> Option<i64> {
        match self {
            Measurement::Lan(m) => m.rssi(),
            Measurement::Web(m) => m.rssi(),
        }
    }

    pub fn uptime(&self) -> Option<i64> {
        match self {
            Measurement::Lan(m) => m.uptime(),
            Measurement::Web(m) => m.uptime(),
        }
    }

    pub fn temp_f(&self) -> Option<i64> {
        match self {
            Measurement::Lan(m) => m.temp_f(),
            Measurement::Web(m) => m.temp_f(),
        }
    }

    /// Relative humidity in percent.
    pub fn humidity(&self) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.humidity(),
            Measurement::Web(m) => m.humidity(),
        }
    }

    pub fn pressure(&self) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.pressure(),
            Measurement::Web(m) => m.pressure(),
        }
    }

    pub fn pm2_5_aqi(&self) -> Result<Option<i64>, MeasurementError> {
        match self {
            Measurement::Lan(m) => Ok(m.pm2_5_aqi()),
            Measurement::Web(m) => m.pm2_5_aqi(),
        }
    }

    pub fn pm2_5_aqi_b(&self) -> Result<Option<i64>, MeasurementError> {
        match self {
            Measurement::Lan(m) => Ok(m.pm2_5_aqi_b()),
            Measurement::Web(m) => m.pm2_5_aqi_b(),
        }
    }

    /// Channel A value for a particulate reading.
    pub fn channel_a(&self, particulate: Particulate) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.channel_a(particulate),
            Measurement::Web(m) => m.channel_a(particulate),
        }
    }

    /// Channel B value; `None` on single-channel devices.
    pub fn channel_b(&self, particulate: Particulate) -> Option<f64> {
        match self {
            Measurement::Lan(m) => m.channel_b(particulate),
            Measurement::Web(m) => m.channel_b(particulate),
        }
    }

    pub fn pm2_5_cf_1(&self) -> Option<f64> {
        self.channel_a(Particulate::Pm2_5Cf1)
    }

    pub fn pm2_5_cf_1_b(&self) -> Option<f64> {
        self.channel_b(Particulate::Pm2_5Cf1)
    }

    /// EPA-corrected PM2.5, or `None` if either channel or humidity is missing.
    pub fn pm2_5_epa_correction(&self) -> Option<f64> {
        aqi::epa_correction(self.pm2_5_cf_1(), self.pm2_5_cf_1_b(), self.humidity())
    }

    /// AQI of the EPA-corrected PM2.5.
    pub fn pm2_5_aqi_epa(&self) -> Result<Option<i64>, MeasurementError> {
        self.pm2_5_epa_correction().map(rounded_aqi).transpose()
    }

    /// Serialize into a time-series point.
    ///
    /// Returns `Ok(None)` when the reading carries no usable data (the LAN
    /// warm-up `"nan"` sentinel). The series name is attached by the caller.
    pub fn prepare_for_point(&self) -> Result<Option<Point>, MeasurementError> {
        match self {
            Measurement::Lan(m) => m.prepare_for_point(self),
            Measurement::Web(m) => m.prepare_for_point(self).map(Some),
        }
    }
}

// ---

/// AQI for a concentration, rounded to the nearest integer.
pub(crate) fn rounded_aqi(pm2_5: f64) -> Result<i64, MeasurementError> {
    Ok(aqi::pm2_5_to_aqi(pm2_5)?.round() as i64)
}

/// Numeric coercion that accepts both JSON numbers and numeric strings.
/// Non-finite values (including the `"nan"` sentinel) yield `None`.
pub(crate) fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Integer coercion; fractional input is truncated.
pub(crate) fn coerce_i64(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    if let Some(i) = value.as_str().and_then(|s| s.trim().parse::<i64>().ok()) {
        return Some(i);
    }
    coerce_f64(Some(value)).map(|f| f.trunc() as i64)
}

pub(crate) fn coerce_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coercion() {
        // ---
        assert_eq!(coerce_f64(Some(&json!("1005.23"))), Some(1005.23));
        assert_eq!(coerce_f64(Some(&json!(0.4))), Some(0.4));
        assert_eq!(coerce_f64(Some(&json!("nan"))), None);
        assert_eq!(coerce_f64(Some(&json!(null))), None);
        assert_eq!(coerce_f64(None), None);

        assert_eq!(coerce_i64(Some(&json!("-58"))), Some(-58));
        assert_eq!(coerce_i64(Some(&json!("29.7"))), Some(29));
        assert_eq!(coerce_i64(Some(&json!(245395))), Some(245395));
        assert_eq!(coerce_i64(Some(&json!(null))), None);

        assert_eq!(coerce_text(Some(&json!(14633))), Some("14633".to_string()));
    }

    #[test]
    fn test_channel_b_keys() {
        // ---
        for particulate in Particulate::ALL {
            assert_eq!(
                particulate.key_b(),
                format!("{}_b", particulate.key()),
                "channel B key mismatch for {:?}",
                particulate
            );
        }
    }
}
