//! Basic usage example: print every signal from one device.
//!
//! ```text
//! ISAPI_HOST=192.168.1.64 ISAPI_USER=admin ISAPI_PASSWORD=secret \
//!     cargo run -p isapi-events-stream --example basic_usage
//! ```

use std::env;

use isapi_stream::{DeviceConfig, Signal, StreamConfig, StreamConnector};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("isapi_stream=debug")
        .init();

    let host = env::var("ISAPI_HOST").unwrap_or_else(|_| "192.168.1.64".to_string());
    let user = env::var("ISAPI_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ISAPI_PASSWORD").unwrap_or_default();

    let device = DeviceConfig::new(host, user, password);
    let config = StreamConfig::default().with_trace(true);
    let (mut connector, mut signals) = StreamConnector::with_channel(device, config)?;

    println!("Streaming from {}", connector.endpoint());
    println!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(Signal::Alarm(event)) => println!("alarm: {event}"),
                Some(Signal::Error { detail }) => println!("error: {detail}"),
                Some(other) => println!("{other:?}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    connector.shutdown().await?;
    Ok(())
}
