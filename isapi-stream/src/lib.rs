//! # isapi-stream
//!
//! A persistent client for the Hikvision ISAPI alert stream.
//!
//! A [`StreamConnector`] holds one long-lived `GET` on
//! `/ISAPI/Event/notification/alertStream`, splits the multipart body into
//! notification documents, maps vendor event codes to canonical ones and
//! turns the device's repeated "still active" notifications into a single
//! start and a single stop per event. Connection lifecycle and alarms reach
//! the consumer as [`Signal`]s through an [`EventPublisher`].
//!
//! ```rust,no_run
//! use isapi_stream::{DeviceConfig, Signal, StreamConfig, StreamConnector};
//!
//! # async fn run() -> isapi_stream::Result<()> {
//! let device = DeviceConfig::new("192.168.1.64", "admin", "secret").with_name("Driveway");
//! let (mut connector, mut signals) = StreamConnector::with_channel(device, StreamConfig::default())?;
//!
//! while let Some(signal) = signals.recv().await {
//!     match signal {
//!         Signal::Alarm(event) => println!("{event}"),
//!         other => println!("{other:?}"),
//!     }
//! }
//!
//! connector.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod connector;
mod error;
mod event;
mod publisher;
mod types;

pub mod framing;
pub mod tracker;

pub use config::*;
pub use connector::StreamConnector;
pub use error::*;
pub use event::Signal;
pub use publisher::{CallbackPublisher, ChannelPublisher, EventPublisher};
pub use tracker::{ActiveEventRecord, ActiveEventTracker, DEFAULT_STALENESS_WINDOW};
pub use types::*;
