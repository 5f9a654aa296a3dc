//! ==============================================================================
//! main.rs - color relay entry point
//! ==============================================================================
//!
//! purpose:
//!     receives color-sensor readings (label + r/g/b/clear) from the pico w
//!     over http, stores each one in influxdb and pushes it to every browser
//!     that is watching.
//!
//! responsibilities:
//!     - load configuration (relay.toml + RELAY_* environment)
//!     - initialize logging
//!     - build the storage client and the viewer broadcaster
//!     - serve the http front door until ctrl-c / SIGTERM
//!
//! architecture:
//!
//!     device ──POST /cor──▶ ┌──────────────────────────────┐
//!                           │         color relay          │
//!                           │  ingest ──write──▶ storage ──┼──▶ influxdb
//!                           │     │                ▲       │
//!                           │     └─▶ broadcaster  │       │
//!                           │            │      GET /dados │
//!                           └────────────┼─────────┼───────┘
//!                                 /ws    ▼         │
//!                                   browser viewers
//!
//! ==============================================================================

use color_relay::broadcaster::Broadcaster;
use color_relay::config::RelayConfig;
use color_relay::handlers::AppState;
use color_relay::{server, storage, telemetry};

use anyhow::{Context, Result};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Color Relay");
    println!("  sensor ──▶ influxdb + live viewers");
    println!("===========================================================");

    // step 1: load configuration
    let config = RelayConfig::load_or_default().with_env_overrides()?;
    config.print_summary();
    config.validate()?;

    // step 2: logging
    telemetry::init_logging(&config.logging)?;

    // step 3: storage client and viewer registry
    let store = storage::from_config(&config).context("failed to initialize storage client")?;
    let broadcaster = Broadcaster::new(config.viewers.channel_capacity);
    let state = AppState {
        store,
        broadcaster,
        show_sensor_data: config.logging.show_sensor_data,
    };

    // step 4: serve
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    server::serve(listener, state, server::shutdown_signal()).await
}
