//! InfluxDB collaborator.
//!
//! The pipeline only needs four operations from the database, captured by
//! [`TimeSeriesDb`]. [`InfluxClient`] implements them over the InfluxDB 1.x
//! HTTP API with `reqwest`:
//!
//! - `GET  /query?q=SHOW DATABASES`
//! - `POST /query` with `q=CREATE DATABASE "<name>"`
//! - `POST /write?db=<name>&precision=ms` with a line-protocol body
//!
//! Responses are classified into [`DbError`]: 4xx is a client error
//! (malformed request, never transient), 5xx a server error, and anything
//! that never got a response a transport error.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::config::Config;
use crate::error::DbError;
use crate::point::{Point, Precision};

// ---

#[async_trait]
pub trait TimeSeriesDb: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>, DbError>;

    async fn create_database(&self, name: &str) -> Result<(), DbError>;

    /// Make `name` the default database for later requests.
    fn switch_database(&mut self, name: &str);

    async fn write_points(
        &self,
        points: &[Point],
        precision: Precision,
        database: &str,
    ) -> Result<(), DbError>;
}

/// InfluxDB 1.x HTTP client.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    database: String,
}

impl InfluxClient {
    /// Build a client from the loaded configuration.
    ///
    /// No request is made here; connectivity is established by the database
    /// bootstrap.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        // ---
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = cfg.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if cfg.ssl && !cfg.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: cfg.influx_base_url(),
            username: cfg.username.clone(),
            password: cfg.password.clone(),
            database: cfg.database.clone(),
        })
    }

    /// The current default database.
    pub fn database(&self) -> &str {
        &self.database
    }

    async fn query(&self, method: Method, q: &str) -> Result<Value, DbError> {
        // ---
        let url = format!("{}/query", self.base_url);
        let request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.username, Some(&self.password));

        let request = if method == Method::GET {
            request.query(&[("q", q)])
        } else {
            request.form(&[("q", q)])
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        if !(200..300).contains(&status) {
            return Err(status_error(status, &body));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| DbError::Server {
            code: status,
            message: format!("malformed query response: {e}"),
        })?;

        if let Some(message) = statement_error(&value) {
            return Err(DbError::Client {
                code: status,
                message,
            });
        }
        Ok(value)
    }
}

#[async_trait]
impl TimeSeriesDb for InfluxClient {
    async fn list_databases(&self) -> Result<Vec<String>, DbError> {
        let value = self.query(Method::GET, "SHOW DATABASES").await?;
        Ok(database_names(&value))
    }

    async fn create_database(&self, name: &str) -> Result<(), DbError> {
        let q = format!("CREATE DATABASE \"{}\"", name.replace('"', "\\\""));
        self.query(Method::POST, &q).await.map(|_| ())
    }

    fn switch_database(&mut self, name: &str) {
        self.database = name.to_string();
    }

    async fn write_points(
        &self,
        points: &[Point],
        precision: Precision,
        database: &str,
    ) -> Result<(), DbError> {
        // ---
        let body = points
            .iter()
            .map(Point::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let response = self
            .client
            .post(format!("{}/write", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", database), ("precision", precision.as_str())])
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

// ---

fn transport_error(e: reqwest::Error) -> DbError {
    DbError::Transport(e.to_string())
}

/// Classify a non-2xx response.
fn status_error(code: u16, body: &str) -> DbError {
    let message = error_message(body);
    if (400..500).contains(&code) {
        DbError::Client { code, message }
    } else {
        DbError::Server { code, message }
    }
}

/// InfluxDB puts the reason in `{"error": "..."}`; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// A 200 response can still carry a per-statement error.
fn statement_error(value: &Value) -> Option<String> {
    value
        .get("results")?
        .as_array()?
        .iter()
        .find_map(|result| result.get("error").and_then(Value::as_str))
        .map(str::to_string)
}

fn database_names(value: &Value) -> Vec<String> {
    value
        .pointer("/results/0/series/0/values")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get(0).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
