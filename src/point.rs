//! Time-series point handed to the database.
//!
//! A [`Point`] can never hold a null tag or field: the builder methods take an
//! `Option` and silently drop `None`, so the "no null on the wire" rule is
//! enforced by construction rather than by a cleanup pass.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

// ---

/// Low-cardinality metadata attached to a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

/// Numeric or boolean measurement value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl TagValue {
    /// Convert a raw JSON scalar. `null`, arrays and objects yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(TagValue::Text(s.clone())),
            Value::Bool(b) => Some(TagValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(TagValue::Integer(i)),
                None => n.as_f64().map(TagValue::Float),
            },
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            TagValue::Text(s) => s.clone(),
            TagValue::Integer(i) => i.to_string(),
            TagValue::Float(f) => f.to_string(),
            TagValue::Boolean(b) => b.to_string(),
        }
    }
}

impl FieldValue {
    /// Convert a raw JSON scalar. Only finite numbers and booleans qualify.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Integer(i)),
                None => n.as_f64().filter(|f| f.is_finite()).map(FieldValue::Float),
            },
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            FieldValue::Integer(i) => format!("{i}i"),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Boolean(b) => b.to_string(),
        }
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Text(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Text(value.to_string())
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::Integer(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::Float(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

// ---

/// Write precision for point timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Milliseconds,
}

impl Precision {
    /// Query-string value understood by InfluxDB.
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Milliseconds => "ms",
        }
    }
}

/// One time-series point: timestamp, tags and fields, plus the series name
/// once the pipeline attaches it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub measurement: String,

    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<Utc>,

    pub tags: BTreeMap<String, TagValue>,
    pub fields: BTreeMap<String, FieldValue>,
}

fn serialize_time<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(time))
}

/// ISO-8601, millisecond precision, UTC with a `Z` suffix.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Point {
    // ---
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            measurement: String::new(),
            time,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach the series (InfluxDB measurement) name.
    pub fn with_measurement(mut self, name: &str) -> Self {
        self.measurement = name.to_string();
        self
    }

    /// Insert a tag; `None` is dropped.
    pub fn tag<V: Into<TagValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.tags.insert(key.to_string(), value.into());
        }
    }

    /// Insert a field; `None` is dropped.
    pub fn field<V: Into<FieldValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value.into());
        }
    }

    pub fn timestamp(&self) -> String {
        format_timestamp(&self.time)
    }

    /// Encode as one line of InfluxDB line protocol with a millisecond
    /// timestamp. Empty tag values are omitted since InfluxDB rejects them.
    pub fn to_line_protocol(&self) -> String {
        // ---
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            let value = value.render();
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(&value, &[',', '=', ' '])
            );
        }

        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value.render()))
            .collect::<Vec<_>>()
            .join(",");

        let _ = write!(line, " {} {}", fields, self.time.timestamp_millis());
        line
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn test_point() -> Point {
        // ---
        Point::new(Utc.with_ymd_and_hms(2020, 8, 23, 10, 44, 25).unwrap())
    }

    #[test]
    fn test_none_values_are_dropped() {
        // ---
        let mut point = test_point();
        point.tag("place", Some("outside"));
        point.tag::<String>("version", None);
        point.field("pm2_5_atm", Some(1.5));
        point.field::<f64>("pm2_5_atm_b", None);

        assert_eq!(point.tags.len(), 1);
        assert_eq!(point.fields.len(), 1);
        assert!(!point.fields.contains_key("pm2_5_atm_b"));
    }

    #[test]
    fn test_json_conversion() {
        // ---
        assert_eq!(TagValue::from_json(&json!(null)), None);
        assert_eq!(TagValue::from_json(&json!(4553)), Some(TagValue::Integer(4553)));
        assert_eq!(TagValue::from_json(&json!("2.0")), Some(TagValue::Text("2.0".into())));
        assert_eq!(FieldValue::from_json(&json!(null)), None);
        assert_eq!(FieldValue::from_json(&json!("rgb(0,228,0)")), None);
        assert_eq!(FieldValue::from_json(&json!(1.19)), Some(FieldValue::Float(1.19)));
        assert_eq!(FieldValue::from_json(&json!(-59)), Some(FieldValue::Integer(-59)));
    }

    #[test]
    fn test_timestamp_format() {
        // ---
        assert_eq!(test_point().timestamp(), "2020-08-23T10:44:25.000Z");
    }

    #[test]
    fn test_line_protocol() {
        // ---
        let mut point = test_point().with_measurement("live");
        point.tag("SensorId", Some("84:f3:eb:7b:c8:ee"));
        point.tag("hidden", Some(false));
        point.tag("label", Some("Back yard, north"));
        point.tag("ssid", Some(""));
        point.field("pm2.5_aqi", Some(5i64));
        point.field("pm2_5_atm", Some(1.19));
        point.field("ok", Some(true));

        assert_eq!(
            point.to_line_protocol(),
            "live,SensorId=84:f3:eb:7b:c8:ee,hidden=false,label=Back\\ yard\\,\\ north \
             ok=true,pm2.5_aqi=5i,pm2_5_atm=1.19 1598179465000"
        );
    }

    #[test]
    fn test_serialized_shape() {
        // ---
        let mut point = test_point();
        point.tag("lat", Some(37.2756));
        point.field("rssi", Some(-59i64));

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(
            value,
            json!({
                "time": "2020-08-23T10:44:25.000Z",
                "tags": { "lat": 37.2756 },
                "fields": { "rssi": -59 }
            })
        );
    }
}
