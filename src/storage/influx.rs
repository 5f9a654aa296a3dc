//! ==============================================================================
//! influx.rs - InfluxDB v2 backend
//! ==============================================================================
//!
//! purpose:
//!     writes each reading as one line-protocol point and reads recent
//!     points back with a flux query, both through `influxdb2::Client`.
//!
//! wire format:
//!     write: `leituras,tipo=cor valor="<color>"` (store assigns the time)
//!     query: flux over the trailing window, `_time` + `_value` per record
//!
//! auth:
//!     the client carries `Authorization: Token <token>`. the token never
//!     leaves it (not logged, not in error messages).
//!
//! ==============================================================================

use super::ReadingStore;
use crate::config::InfluxConfig;
use crate::domain::{StoredPoint, MEASUREMENT, TYPE_TAG, VALUE_FIELD};
use crate::error::StorageError;

use async_trait::async_trait;
use chrono::Utc;
use influxdb2::models::Query;
use influxdb2::{Client, RequestError};
use influxdb2_structmap::value::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub struct InfluxStore {
    client: Client,
    org: String,
    bucket: String,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig) -> Result<Self, StorageError> {
        for (name, value) in [
            ("url", &config.url),
            ("token", &config.token),
            ("org", &config.org),
            ("bucket", &config.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(StorageError::InvalidConfig(format!("influx {} is empty", name)));
            }
        }

        let url = config.url.trim_end_matches('/');
        Ok(Self {
            client: Client::new(url, config.org.as_str(), config.token.as_str()),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }
}

fn storage_error(err: RequestError) -> StorageError {
    match err {
        RequestError::Http { status, text, .. } => {
            StorageError::Rejected { status: status.as_u16(), body: text }
        }
        RequestError::ReqwestProcessing { source, .. } => {
            StorageError::Unreachable(source.to_string())
        }
        other => StorageError::MalformedResponse(other.to_string()),
    }
}

#[async_trait]
impl ReadingStore for InfluxStore {
    async fn write(&self, color: &str) -> Result<(), StorageError> {
        let line = line_protocol(color);
        debug!(bucket = %self.bucket, %line, "writing point");

        self.client
            .write_line_protocol(&self.org, &self.bucket, line)
            .await
            .map_err(storage_error)
    }

    async fn query_recent(
        &self,
        window_minutes: u32,
        limit: usize,
    ) -> Result<Vec<StoredPoint>, StorageError> {
        let flux = recent_points_query(&self.bucket, window_minutes, limit);
        debug!(%flux, "querying recent points");

        let records = self
            .client
            .query_raw(Some(Query::new(flux)))
            .await
            .map_err(storage_error)?;

        records.iter().map(|record| point_from_values(&record.values)).collect()
    }

    async fn close(&self) -> Result<(), StorageError> {
        // writes are synchronous per request; nothing is buffered
        debug!("influx client closed");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "influx"
    }
}

/// `_time` + `_value` of one flux record
fn point_from_values(values: &BTreeMap<String, Value>) -> Result<StoredPoint, StorageError> {
    let time = match values.get("_time") {
        Some(Value::TimeRFC(time)) => time.with_timezone(&Utc),
        other => {
            return Err(StorageError::MalformedResponse(format!("unexpected _time: {:?}", other)))
        }
    };
    let value = match values.get("_value") {
        Some(Value::String(value)) => value.clone(),
        other => {
            return Err(StorageError::MalformedResponse(format!("unexpected _value: {:?}", other)))
        }
    };
    Ok(StoredPoint { value, time })
}

/// `leituras,tipo=cor valor="<color>"` with string-field escaping.
/// newlines would end the line, so they travel as `\n` / `\r` escapes.
pub fn line_protocol(color: &str) -> String {
    let escaped = color
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("{},{}={} {}=\"{}\"", MEASUREMENT, TYPE_TAG.0, TYPE_TAG.1, VALUE_FIELD, escaped)
}

/// last `limit` color points of the trailing window, in time order
pub fn recent_points_query(bucket: &str, window_minutes: u32, limit: usize) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -{window}m)
  |> filter(fn: (r) => r._measurement == "{measurement}" and r.{tag} == "{tag_value}" and r._field == "{field}")
  |> tail(n: {limit})"#,
        bucket = flux_string(bucket),
        window = window_minutes,
        measurement = MEASUREMENT,
        tag = TYPE_TAG.0,
        tag_value = TYPE_TAG.1,
        field = VALUE_FIELD,
        limit = limit,
    )
}

fn flux_string(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"").replace("${", "\\${")
}
