//! Rust library for controlling BreatheAudio 6-zone amplifiers
//!
//! The amplifier is driven over an RS-232 link (9600 baud, 8N1) using a
//! small carriage-return terminated text protocol. This library provides:
//!
//! - Frame encoding for power, mute, volume and source commands
//! - Decoding of zone status replies
//! - A thread-blocking controller ([`Amplifier`]) and an async one
//!   ([`AmplifierClient`]) sharing the same codec
//! - Per-zone snapshot and restore
//! - Per-zone handles with last-known state and source names ([`Zone`])
//!
//! # Quick Start
//!
//! ```no_run
//! use breatheaudio::{AmplifierClient, AmplifierConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AmplifierConfig::from_json(
//!         r#"{ "port": "/dev/ttyUSB0", "sources": { "1": "Streamer", "2": "TV" } }"#,
//!     )?;
//!     let client = AmplifierClient::open(&config)?;
//!
//!     for zone in client.zones(&config.source_table()?) {
//!         zone.update().await?;
//!         println!("{}: {:?}", zone.name(), zone.state());
//!     }
//!
//!     // Remember zone 1, change it, then put it back
//!     client.snapshot(1).await?;
//!     client.set_volume(1, 20).await?;
//!     client.restore(1).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Protocol**: frame codec (`*Z0{zone}...\r` commands, `#Z0{zone}...` replies)
//! - **Serial**: blocking transport over a `serialport` link
//! - **Connection**: async transport fed by a push queue of inbound bytes
//! - **Amplifier / Client**: validated command surface over either transport
//! - **Snapshot**: last captured status per zone
//! - **Zone**: presentation-side handle for one zone

mod amplifier;
mod client;
mod config;
mod connection;
mod error;
pub mod protocol;
mod serial;
mod snapshot;
mod types;
mod zone;

// Public exports
pub use amplifier::Amplifier;
pub use client::AmplifierClient;
pub use config::{AmplifierConfig, SerialSettings, BAUD_RATE, DEFAULT_TIMEOUT};
pub use connection::{AsyncSession, AsyncTransport, InboundSink, LinkEnd};
pub use error::{BreatheError, Result};
pub use serial::{open_port, BlockingSession, BlockingTransport, SerialLink};
pub use snapshot::SnapshotStore;
pub use types::{
    validate_zone, SourceId, SourceTable, ZoneId, ZoneStatus, MAX_VOLUME, POLL_INTERVAL,
    ZONE_COUNT, ZONE_IDS,
};
pub use zone::{Zone, ZoneState, VOLUME_STEP};
