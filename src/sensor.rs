//! PurpleAir sensor variants and the HTTP fetch collaborator.
//!
//! A sensor is either on the local network (queried at `http://<addr>/json`)
//! or looked up through the public web API by numeric id. The variant is
//! chosen once at startup and decides the request URL, the series name, and
//! which [`Measurement`] shape the raw JSON becomes.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{FetchError, MeasurementError, ValidationError};
use crate::measurement::{LanMeasurement, Measurement, WebMeasurement};

// ---

const WEB_HOST: &str = "purpleair.com";

/// Status code and body of one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Performs the raw HTTP GET against a sensor.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawResponse, FetchError>;
}

/// [`Fetch`] over a shared `reqwest` client, with the client's default
/// timeouts.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawResponse, FetchError> {
        // ---
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        Ok(RawResponse { status, body })
    }
}

// ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sensor {
    /// Sensor on the local network. `live` selects the ~10 second live feed
    /// over the 120 second average.
    Lan { addr: String, live: bool },
    /// Sensor looked up through the public JSON API.
    Web { sensor_id: u64 },
}

/// An IPv4 address or a `purpleair-<digits>` hostname.
fn is_valid_lan_addr(addr: &str) -> bool {
    if addr.parse::<Ipv4Addr>().is_ok() {
        return true;
    }
    addr.to_lowercase()
        .strip_prefix("purpleair-")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}

impl Sensor {
    /// LAN sensor at `addr` (no scheme).
    ///
    /// # Errors
    /// [`ValidationError::InvalidAddress`] if `addr` is neither an IPv4
    /// address nor a PurpleAir hostname.
    pub fn lan(addr: &str, live: bool) -> Result<Self, ValidationError> {
        // ---
        if !is_valid_lan_addr(addr) {
            return Err(ValidationError::InvalidAddress(addr.to_string()));
        }
        Ok(Sensor::Lan {
            addr: addr.to_string(),
            live,
        })
    }

    pub fn web(sensor_id: u64) -> Self {
        Sensor::Web { sensor_id }
    }

    /// URL to GET for one reading.
    pub fn fetch_target(&self) -> String {
        match self {
            Sensor::Lan { addr, live: true } => format!("http://{addr}/json?live=true"),
            Sensor::Lan { addr, live: false } => format!("http://{addr}/json"),
            Sensor::Web { sensor_id } => format!("https://www.{WEB_HOST}/json?show={sensor_id}"),
        }
    }

    /// InfluxDB measurement (series) the readings are written to.
    pub fn series_name(&self) -> &'static str {
        match self {
            Sensor::Lan { live: true, .. } => "live",
            Sensor::Lan { live: false, .. } => "average",
            Sensor::Web { .. } => "sensors",
        }
    }

    /// Human-readable name of the remote end, for log lines.
    pub fn label(&self) -> String {
        match self {
            Sensor::Lan { addr, .. } => addr.clone(),
            Sensor::Web { .. } => WEB_HOST.to_string(),
        }
    }

    /// Whether a raw reading carries usable data for this variant.
    pub fn validity_check(&self, raw: &Value) -> bool {
        match self {
            Sensor::Lan { .. } => raw
                .as_object()
                .is_some_and(|data| !crate::measurement::has_nan_sentinel(data)),
            Sensor::Web { .. } => raw
                .get("results")
                .and_then(Value::as_array)
                .is_some_and(|results| !results.is_empty()),
        }
    }

    /// Wrap a raw reading in the measurement shape for this variant.
    pub fn to_measurement(&self, raw: &Value) -> Result<Measurement, MeasurementError> {
        match self {
            Sensor::Lan { .. } => match raw {
                Value::Object(data) => Ok(Measurement::Lan(LanMeasurement::new(data.clone()))),
                _ => Err(MeasurementError::NotAnObject),
            },
            Sensor::Web { .. } => Ok(Measurement::Web(WebMeasurement::new(raw)?)),
        }
    }

    /// Fetch one raw reading.
    ///
    /// A non-200 status or an unparseable body is logged and yields
    /// `Ok(None)`. Only a transport failure is an error, since that is what
    /// the sensor-link tracker follows.
    pub async fn query<F: Fetch + ?Sized>(&self, fetcher: &F) -> Result<Option<Value>, FetchError> {
        // ---
        let url = self.fetch_target();
        debug!("Querying sensor: {}", url);

        let response = fetcher.fetch(&url).await?;
        if response.status != 200 {
            error!("Cannot query URL: {}", url);
            error!("Response status code: {}", response.status);
            error!("Response text:\n{}", response.body);
            return Ok(None);
        }

        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                error!("Sensor at {} returned malformed JSON: {}", url, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    struct Canned(Result<RawResponse, ()>);

    #[async_trait]
    impl Fetch for Canned {
        async fn fetch(&self, url: &str) -> Result<RawResponse, FetchError> {
            self.0.clone().map_err(|_| FetchError::Transport {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    #[test]
    fn test_lan_address_validation() {
        // ---
        assert_ok!(Sensor::lan("192.168.1.20", false));
        assert_ok!(Sensor::lan("purpleair-1234", false));
        assert_ok!(Sensor::lan("PurpleAir-1234.local", false));

        assert_eq!(
            Sensor::lan("example.com", false),
            Err(ValidationError::InvalidAddress("example.com".into()))
        );
        assert_err!(Sensor::lan("purpleair-", false));
        assert_err!(Sensor::lan("http://192.168.1.20", false));
        assert_err!(Sensor::lan("192.168.1", false));
    }

    #[test]
    fn test_fetch_targets() {
        // ---
        let average = Sensor::lan("192.168.1.20", false).unwrap();
        let live = Sensor::lan("192.168.1.20", true).unwrap();
        let web = Sensor::web(14633);

        assert_eq!(average.fetch_target(), "http://192.168.1.20/json");
        assert_eq!(live.fetch_target(), "http://192.168.1.20/json?live=true");
        assert_eq!(web.fetch_target(), "https://www.purpleair.com/json?show=14633");

        assert_eq!(average.series_name(), "average");
        assert_eq!(live.series_name(), "live");
        assert_eq!(web.series_name(), "sensors");
        assert_eq!(web.label(), "purpleair.com");
    }

    #[test]
    fn test_validity_check() {
        // ---
        let lan = Sensor::lan("192.168.1.20", true).unwrap();
        assert!(lan.validity_check(&json!({ "pm2_5_atm": 1.0 })));
        assert!(!lan.validity_check(&json!({ "pm2_5_atm": "nan" })));
        assert!(!lan.validity_check(&json!([])));

        let web = Sensor::web(1);
        assert!(web.validity_check(&json!({ "results": [{}] })));
        assert!(!web.validity_check(&json!({ "results": [] })));
    }

    #[test]
    fn test_to_measurement_picks_variant() {
        // ---
        let lan = Sensor::lan("192.168.1.20", true).unwrap();
        assert!(matches!(
            lan.to_measurement(&json!({})),
            Ok(Measurement::Lan(_))
        ));
        assert!(matches!(
            lan.to_measurement(&json!("nope")),
            Err(MeasurementError::NotAnObject)
        ));
        assert!(matches!(
            Sensor::web(1).to_measurement(&json!({ "results": [] })),
            Err(MeasurementError::NoResults)
        ));
    }

    #[tokio::test]
    async fn test_query_ok() {
        // ---
        let fetcher = Canned(Ok(RawResponse {
            status: 200,
            body: r#"{"SensorId":"84:f3:eb:7b:c8:ee"}"#.to_string(),
        }));
        let sensor = Sensor::lan("192.168.1.20", false).unwrap();

        let value = sensor.query(&fetcher).await.unwrap();
        assert_eq!(value, Some(json!({ "SensorId": "84:f3:eb:7b:c8:ee" })));
    }

    #[tokio::test]
    async fn test_query_non_200_is_no_data() {
        // ---
        let fetcher = Canned(Ok(RawResponse {
            status: 503,
            body: "busy".to_string(),
        }));
        let value = Sensor::web(1).query(&fetcher).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_query_malformed_body_is_no_data() {
        // ---
        let fetcher = Canned(Ok(RawResponse {
            status: 200,
            body: "<html>".to_string(),
        }));
        let value = Sensor::web(1).query(&fetcher).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_query_transport_error() {
        // ---
        let fetcher = Canned(Err(()));
        let sensor = Sensor::lan("192.168.1.20", false).unwrap();
        assert!(matches!(
            sensor.query(&fetcher).await,
            Err(FetchError::Transport { .. })
        ));
    }
}
