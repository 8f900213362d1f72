//! Configuration for the `purpleair-influx` writer.
//!
//! Every option can be given on the command line or through the environment
//! (with optional `.env` support provided by the caller), so the writer runs
//! the same way from a shell, a systemd unit, or a container. By consolidating
//! configuration here, the rest of the crate never touches `env::var`.

use std::time::Duration;

use clap::{ArgGroup, Parser};

use crate::error::ValidationError;
use crate::sensor::Sensor;

/// Default InfluxDB database name.
pub const DEFAULT_DATABASE: &str = "purpleair";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone, Parser)]
#[command(version, about = "Poll a PurpleAir sensor and write its readings to InfluxDB")]
#[command(group(ArgGroup::new("sensor").required(true).args(["lan_addr", "web_sensor_id"])))]
pub struct Config {
    // ---
    /// Address of a LAN sensor (IPv4 address or purpleair-<digits> hostname).
    #[arg(short = 'l', long, env = "PURPLEAIR_LAN_ADDR")]
    pub lan_addr: Option<String>,

    /// Web sensor ID.
    #[arg(short = 'w', long, env = "PURPLEAIR_WEB_SENSOR_ID")]
    pub web_sensor_id: Option<u64>,

    /// Use the live feed in LAN mode instead of the 120 second average.
    #[arg(long, env = "PURPLEAIR_LAN_LIVE")]
    pub lan_live: bool,

    /// Number of seconds to wait between queries.
    #[arg(long, env = "QUERY_INTERVAL", default_value_t = 30)]
    pub query_interval: u64,

    /// InfluxDB host.
    #[arg(short = 'H', long, env = "INFLUXDB_HOST", default_value = "localhost")]
    pub host: String,

    /// InfluxDB port.
    #[arg(short = 'P', long, env = "INFLUXDB_PORT", default_value_t = 8086)]
    pub port: u16,

    /// InfluxDB username.
    #[arg(short = 'u', long, env = "INFLUXDB_USERNAME", default_value = "root")]
    pub username: String,

    /// InfluxDB password.
    #[arg(short = 'p', long, env = "INFLUXDB_PASSWORD", default_value = "root")]
    pub password: String,

    /// InfluxDB database.
    #[arg(short = 'd', long, env = "INFLUXDB_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// InfluxDB request timeout in seconds (client default when unset).
    #[arg(short = 't', long, env = "INFLUXDB_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Connect to InfluxDB over HTTPS.
    #[arg(long, env = "INFLUXDB_SSL")]
    pub ssl: bool,

    /// Verify the InfluxDB TLS certificate.
    #[arg(long, env = "INFLUXDB_VERIFY_SSL")]
    pub verify_ssl: bool,

    /// Path prefix in front of the InfluxDB API, for reverse proxies.
    #[arg(long, env = "INFLUXDB_PATH", default_value = "")]
    pub path: String,
}

impl Config {
    /// Check values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ValidationError> {
        // ---
        if self.query_interval == 0 {
            return Err(ValidationError::InvalidConfig(
                "query interval must be greater than zero".to_string(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ValidationError::InvalidConfig(
                "database name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the sensor selected on the command line.
    pub fn sensor(&self) -> Result<Sensor, ValidationError> {
        match (&self.lan_addr, self.web_sensor_id) {
            (Some(addr), None) => Sensor::lan(addr, self.lan_live),
            (None, Some(id)) => Ok(Sensor::web(id)),
            _ => Err(ValidationError::InvalidConfig(
                "exactly one of --lan-addr and --web-sensor-id is required".to_string(),
            )),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.query_interval)
    }

    /// Base URL of the InfluxDB HTTP API, without a trailing slash.
    pub fn influx_base_url(&self) -> String {
        // ---
        let scheme = if self.ssl { "https" } else { "http" };
        let path = self.path.trim_matches('/');
        if path.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the password while showing all other values that were loaded.
    pub fn log_config(&self) {
        // ---
        let feed = if self.lan_live { "live" } else { "average" };
        let sensor = match (&self.lan_addr, self.web_sensor_id) {
            (Some(addr), _) => format!("lan {} ({})", addr, feed),
            (None, Some(id)) => format!("web {}", id),
            (None, None) => "<none>".to_string(),
        };
        let timeout = self
            .timeout
            .map_or_else(|| "client default".to_string(), |t| format!("{t}s"));

        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR         : {}", sensor);
        tracing::info!("  QUERY_INTERVAL : {}s", self.query_interval);
        tracing::info!("  INFLUXDB_URL   : {}", self.influx_base_url());
        tracing::info!("  INFLUXDB_USER  : {}:****", self.username);
        tracing::info!("  DATABASE       : {}", self.database);
        tracing::info!("  TIMEOUT        : {}", timeout);
        tracing::info!("  VERIFY_SSL     : {}", self.verify_ssl);
    }
}
