//! ==============================================================================
//! domain.rs - readings, stored points and viewer events
//! ==============================================================================
//!
//! purpose:
//!     the plain data types that flow through the relay:
//!     - IncomingReading: the POST /cor body as it arrives (everything optional)
//!     - SensorReading:   a validated reading (color label is guaranteed)
//!     - StoredPoint:     one record read back from the time-series store
//!     - QueryEntry:      one element of the GET /dados response
//!     - ViewerEvent:     the frame pushed to every live viewer
//!
//! relationships:
//!     - used by: handlers.rs (validation), storage/ (points), broadcaster.rs (events)
//!
//! ==============================================================================

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// measurement name every reading is written under
pub const MEASUREMENT: &str = "leituras";
/// tag key/value that marks a point as a color reading
pub const TYPE_TAG: (&str, &str) = ("tipo", "cor");
/// field key holding the color label
pub const VALUE_FIELD: &str = "valor";

/// raw device payload, before validation
///
/// both route shapes (`{cor}` and `{cor, r, g, b, clear}`) deserialize into this.
/// a channel that is absent or `null` stays `None`.
#[derive(Debug, Default, Deserialize)]
pub struct IncomingReading {
    pub cor: Option<String>,
    pub r: Option<f64>,
    pub g: Option<f64>,
    pub b: Option<f64>,
    pub clear: Option<f64>,
}

/// a validated color-sensor sample
///
/// `None` on a channel means "not available", which is distinct from a
/// genuine zero intensity. serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub cor: String,
    pub r: Option<f64>,
    pub g: Option<f64>,
    pub b: Option<f64>,
    pub clear: Option<f64>,
}

impl SensorReading {
    /// validate an incoming payload. returns `None` when the color label is
    /// missing or empty.
    pub fn from_incoming(incoming: IncomingReading) -> Option<Self> {
        let cor = incoming.cor.filter(|c| !c.is_empty())?;
        Some(Self {
            cor,
            r: incoming.r,
            g: incoming.g,
            b: incoming.b,
            clear: incoming.clear,
        })
    }
}

/// channel value display for log lines: "N/A" when the sensor sent nothing
pub struct Channel(pub Option<f64>);

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("N/A"),
        }
    }
}

/// a `leituras,tipo=cor valor=<color>` record as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub value: String,
    pub time: DateTime<Utc>,
}

/// one element of the GET /dados response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEntry {
    pub cor: String,
    pub hora: String,
}

impl From<StoredPoint> for QueryEntry {
    fn from(point: StoredPoint) -> Self {
        Self {
            cor: point.value,
            hora: point.time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

/// a frame pushed to viewers over the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ViewerEvent {
    UpdateData(SensorReading),
}
