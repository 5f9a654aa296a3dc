//! color relay: device readings in over HTTP, into InfluxDB, out to live viewers

pub mod broadcaster;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod server;
pub mod storage;
pub mod telemetry;
