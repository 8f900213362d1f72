//! PM2.5 air-quality math.
//!
//! - [`pm2_5_to_aqi`] maps a concentration in µg/m³ onto the EPA Air Quality
//!   Index by piecewise-linear interpolation.
//! - [`epa_correction`] applies the EPA humidity bias correction for low-cost
//!   sensors to a single two-channel reading.
//!
//! The correction is a snapshot transform on one instantaneous reading. It is
//! not the hourly-averaged form the EPA publishes and must not be labelled as
//! such.

use crate::error::AqiError;

// ---

/// PM2.5 breakpoints in tenths of µg/m³, paired with their AQI range.
///
/// Concentrations are bucketed on an integer tenths scale so that values such
/// as 12.05 land in a bucket instead of falling between `12.0` and `12.1`.
const PM25_BREAKPOINTS: [((i64, i64), (f64, f64)); 7] = [
    ((0, 120), (0.0, 50.0)),
    ((121, 354), (51.0, 100.0)),
    ((355, 554), (101.0, 150.0)),
    ((555, 1504), (151.0, 200.0)),
    ((1505, 2504), (201.0, 300.0)),
    ((2505, 3504), (301.0, 400.0)),
    ((3505, 5004), (401.0, 500.0)),
];

/// Absorbs representation error in `c * 10.0` (e.g. 12.1 * 10 = 120.999...).
const TENTHS_EPSILON: f64 = 1e-6;

/// Convert a PM2.5 concentration (µg/m³) to an AQI value.
///
/// The result is not rounded; rounding policy belongs to the caller.
///
/// # Errors
/// [`AqiError::OutOfRange`] for negative, non-finite, or above-table input.
/// The table covers the sensor's operating range, so out-of-range input means
/// a unit or data-integrity bug upstream and is never clamped.
pub fn pm2_5_to_aqi(pm2_5: f64) -> Result<f64, AqiError> {
    // ---
    if !pm2_5.is_finite() || pm2_5 < 0.0 {
        return Err(AqiError::OutOfRange(pm2_5));
    }

    let tenths = (pm2_5 * 10.0 + TENTHS_EPSILON).trunc() as i64;

    for ((c_low, c_high), (i_low, i_high)) in PM25_BREAKPOINTS {
        if (c_low..=c_high).contains(&tenths) {
            let c = tenths as f64 / 10.0;
            let c_low = c_low as f64 / 10.0;
            let c_high = c_high as f64 / 10.0;
            return Ok((i_high - i_low) * ((c - c_low) / (c_high - c_low)) + i_low);
        }
    }

    Err(AqiError::OutOfRange(pm2_5))
}

/// EPA humidity correction for a two-channel PM2.5 (CF=1) reading.
///
/// Returns `None` when any input is missing: single-channel devices and
/// readings without humidity cannot be corrected. The result is clamped at
/// zero since the linear model goes negative for clean, humid air.
pub fn epa_correction(
    pm2_5_cf_1: Option<f64>,
    pm2_5_cf_1_b: Option<f64>,
    humidity: Option<f64>,
) -> Option<f64> {
    // ---
    let (a, b, humidity) = (pm2_5_cf_1?, pm2_5_cf_1_b?, humidity?);
    let mean = (a + b) / 2.0;

    Some((0.534 * mean - 0.0844 * humidity + 5.604).max(0.0))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use proptest::prelude::*;

    fn aqi(pm2_5: f64) -> i64 {
        pm2_5_to_aqi(pm2_5).unwrap().round() as i64
    }

    #[test]
    fn test_bucket_boundaries() {
        // ---
        assert_eq!(pm2_5_to_aqi(12.0).unwrap(), 50.0);
        assert_eq!(pm2_5_to_aqi(12.1).unwrap(), 51.0);
        assert_eq!(pm2_5_to_aqi(35.4).unwrap(), 100.0);
        assert_eq!(pm2_5_to_aqi(35.5).unwrap(), 101.0);
        assert_eq!(pm2_5_to_aqi(55.4).unwrap(), 150.0);
        assert_eq!(pm2_5_to_aqi(55.5).unwrap(), 151.0);
        assert_eq!(pm2_5_to_aqi(150.5).unwrap(), 201.0);
        assert_eq!(pm2_5_to_aqi(250.5).unwrap(), 301.0);
        assert_eq!(pm2_5_to_aqi(350.5).unwrap(), 401.0);
        assert_eq!(pm2_5_to_aqi(500.4).unwrap(), 500.0);
    }

    #[test]
    fn test_interpolation() {
        // ---
        assert_eq!(aqi(0.0), 0);
        assert_eq!(aqi(6.0), 25);
        assert_eq!(aqi(35.0), 99);
        assert_eq!(aqi(100.0), 174);
    }

    #[test]
    fn test_values_between_table_rows_are_bucketed() {
        // ---
        // A plain float comparison against (0, 12.0) and (12.1, 35.4) leaves
        // 12.05 in neither bucket.
        assert_eq!(pm2_5_to_aqi(12.05).unwrap(), 50.0);
        assert_eq!(pm2_5_to_aqi(35.45).unwrap(), 100.0);
        assert_eq!(pm2_5_to_aqi(500.45).unwrap(), 500.0);
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        // ---
        assert_eq!(pm2_5_to_aqi(-0.1), Err(AqiError::OutOfRange(-0.1)));
        assert_eq!(pm2_5_to_aqi(500.5), Err(AqiError::OutOfRange(500.5)));
        assert!(pm2_5_to_aqi(f64::NAN).is_err());
        assert!(pm2_5_to_aqi(f64::INFINITY).is_err());
    }

    #[test]
    fn test_epa_correction_value() {
        // ---
        let corrected = epa_correction(Some(10.0), Some(10.0), Some(50.0)).unwrap();
        assert!((corrected - 6.724).abs() < 1e-9);
    }

    #[test]
    fn test_epa_correction_clamps_at_zero() {
        // ---
        assert_eq!(epa_correction(Some(0.0), Some(0.0), Some(100.0)), Some(0.0));
    }

    #[test]
    fn test_epa_correction_requires_all_inputs() {
        // ---
        assert_eq!(epa_correction(None, Some(1.0), Some(40.0)), None);
        assert_eq!(epa_correction(Some(1.0), None, Some(40.0)), None);
        assert_eq!(epa_correction(Some(1.0), Some(1.0), None), None);
    }

    proptest! {
        #[test]
        fn prop_epa_correction_never_negative(
            a in 0.0f64..1000.0,
            b in 0.0f64..1000.0,
            humidity in 0.0f64..=100.0,
        ) {
            let corrected = epa_correction(Some(a), Some(b), Some(humidity)).unwrap();
            prop_assert!(corrected >= 0.0);
        }

        #[test]
        fn prop_aqi_is_monotonic(c in 0.0f64..500.0, step in 0.1f64..10.0) {
            let next = (c + step).min(500.4);
            prop_assert!(pm2_5_to_aqi(c).unwrap() <= pm2_5_to_aqi(next).unwrap());
        }
    }
}
