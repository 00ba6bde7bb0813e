//! Long-lived connection to a device's alert stream.
//!
//! A [`StreamConnector`] owns one background task. The task opens the
//! stream, feeds every received document through the parser, the code
//! table and an [`ActiveEventTracker`], and publishes the resulting
//! [`Signal`]s. When the stream ends it waits and reconnects:
//!
//! - clean end of the body: `Disconnected`, retry after `reconnect_after_end`
//! - connect failure, rejected status, read error or stall: `Error`, retry
//!   after `reconnect_after_error`
//!
//! Events still active when a session ends are stopped before the
//! `Disconnected`/`Error` signal. Only [`StreamConnector::shutdown`] ends the
//! loop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;

use isapi_parser::{normalize, parse_alert};

use crate::config::{DeviceConfig, StreamConfig};
use crate::error::{Result, StreamError};
use crate::event::Signal;
use crate::framing::FrameSplitter;
use crate::publisher::{ChannelPublisher, EventPublisher};
use crate::tracker::ActiveEventTracker;
use crate::types::ConnectionState;

const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a running alert stream.
///
/// # Shutdown
///
/// [`shutdown`](Self::shutdown) stops the background task, waiting up to 5
/// seconds before aborting it. Dropping the handle aborts the task
/// immediately.
pub struct StreamConnector {
    device_name: String,
    endpoint: String,
    state: Arc<watch::Sender<ConnectionState>>,
    background_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl StreamConnector {
    /// Validate the configuration and start streaming in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<P>(device: DeviceConfig, config: StreamConfig, publisher: P) -> Result<Self>
    where
        P: EventPublisher + 'static,
    {
        device.validate()?;
        config.validate()?;

        let url = device.endpoint_url()?;
        let client = Client::builder()
            .danger_accept_invalid_certs(!device.strict_tls)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
            .map_err(|e| StreamError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let state = Arc::new(state_tx);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let span = info_span!("alert_stream", device = %device.name);
        let device_name = device.name.clone();
        let endpoint = url.to_string();

        let session = SessionLoop {
            client,
            url,
            device,
            config,
            publisher: Box::new(publisher),
            state: state.clone(),
        };
        let background_task = tokio::spawn(session.run(shutdown_rx).instrument(span));

        Ok(Self {
            device_name,
            endpoint,
            state,
            background_task: Some(background_task),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Start streaming into a bounded channel of `event_buffer_size` signals.
    pub fn with_channel(
        device: DeviceConfig,
        config: StreamConfig,
    ) -> Result<(Self, mpsc::Receiver<Signal>)> {
        config.validate()?;
        let (publisher, receiver) = ChannelPublisher::channel(config.event_buffer_size);
        let connector = Self::start(device, config, publisher)?;
        Ok((connector, receiver))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_running(&self) -> bool {
        self.background_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop streaming. No signal is published after this returns.
    ///
    /// Cancels an in-flight connect or a pending reconnect. Calling it again
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked or had to be aborted after the
    /// 5 second timeout.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        let result = match self.background_task.take() {
            Some(mut task) => match timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) if e.is_cancelled() => Ok(()),
                Ok(Err(e)) => Err(StreamError::ShutdownError(format!(
                    "Stream task panicked: {e}"
                ))),
                Err(_) => {
                    task.abort();
                    Err(StreamError::ShutdownError(
                        "Stream task shutdown timed out after 5 seconds".to_string(),
                    ))
                }
            },
            None => Ok(()),
        };

        self.state.send_replace(ConnectionState::Disconnected);
        result
    }
}

impl Drop for StreamConnector {
    fn drop(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
        }
    }
}

/// State owned by the background task.
struct SessionLoop {
    client: Client,
    url: Url,
    device: DeviceConfig,
    config: StreamConfig,
    publisher: Box<dyn EventPublisher>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl SessionLoop {
    async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        loop {
            self.state.send_replace(ConnectionState::Connecting);

            let outcome = tokio::select! {
                outcome = self.run_session() => outcome,
                _ = shutdown_rx.recv() => break,
            };

            let delay = match &outcome {
                Ok(()) => {
                    info!(
                        "Alert stream ended, reconnecting in {:?}",
                        self.config.reconnect_after_end
                    );
                    self.config.reconnect_after_end
                }
                Err(e) => {
                    warn!(
                        "Alert stream error: {e}, reconnecting in {:?}",
                        self.config.reconnect_after_error
                    );
                    self.config.reconnect_after_error
                }
            };

            self.state.send_replace(ConnectionState::Reconnecting);
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        self.state.send_replace(ConnectionState::Disconnected);
        info!("Alert stream stopped");
    }

    /// One connection attempt, from request to end of body.
    ///
    /// Publishes the closing `Disconnected` or `Error` itself, after any
    /// stops for events left active.
    async fn run_session(&mut self) -> Result<()> {
        let mut tracker = ActiveEventTracker::new(self.config.staleness_window);
        let result = self.stream_alerts(&mut tracker).await;

        for event in tracker.drain() {
            if self.config.trace {
                debug!("Session ended with {event} active");
            }
            self.publisher.publish(Signal::Alarm(event)).await;
        }

        let closing = match &result {
            Ok(()) => Signal::Disconnected,
            Err(e) => Signal::error(e.to_string()),
        };
        self.publisher.publish(closing).await;

        result
    }

    async fn stream_alerts(&mut self, tracker: &mut ActiveEventTracker) -> Result<()> {
        if self.config.trace {
            debug!("Connecting to {}", self.url);
        }

        let request = self
            .client
            .get(self.url.clone())
            .basic_auth(&self.device.username, Some(&self.device.password))
            .header(ACCEPT, STREAM_CONTENT_TYPE)
            .send();

        // connect_timeout ends at the handshake; a device can still sit on the request
        let response_timeout = self.config.response_timeout;
        let response = timeout(response_timeout, request)
            .await
            .map_err(|_| StreamError::Connect {
                url: self.url.to_string(),
                reason: format!("No response within {response_timeout:?}"),
            })?
            .map_err(|e| StreamError::Connect {
                url: self.url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Connect {
                url: self.url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        self.state.send_replace(ConnectionState::Streaming);
        info!("Alert stream connected");
        self.publisher.publish(Signal::Connected).await;

        let mut body = Box::pin(response.bytes_stream());
        let mut splitter = FrameSplitter::new(self.config.max_frame_bytes);

        loop {
            let next = match self.config.idle_timeout {
                Some(idle) => timeout(idle, body.next())
                    .await
                    .map_err(|_| StreamError::IdleTimeout(idle))?,
                None => body.next().await,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(StreamError::Stream(e.to_string())),
                None => return Ok(()),
            };

            for frame in splitter.push(&chunk) {
                self.dispatch(&frame, tracker).await;
            }
        }
    }

    async fn dispatch(&self, frame: &[u8], tracker: &mut ActiveEventTracker) {
        let alert = match parse_alert(frame) {
            Ok(alert) => alert,
            Err(e) => {
                warn!("Skipping malformed alert frame: {e}");
                return;
            }
        };

        let code = normalize(&alert.event_type);
        if self.config.trace {
            debug!(
                event_type = %alert.event_type,
                code,
                state = ?alert.event_state,
                channel = alert.channel,
                active_post_count = alert.active_post_count,
                "Alert frame"
            );
        }

        for event in tracker.observe(&alert, code) {
            if self.config.trace {
                debug!("{event}");
            }
            self.publisher.publish(Signal::Alarm(event)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let device = DeviceConfig::new("", "admin", "pw");
        assert!(StreamConnector::with_channel(device, StreamConfig::default()).is_err());

        let device = DeviceConfig::new("127.0.0.1", "admin", "pw");
        let config = StreamConfig::default().with_buffer_size(0);
        assert!(matches!(
            StreamConnector::with_channel(device, config),
            Err(StreamError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let device = DeviceConfig::new("127.0.0.1", "admin", "pw").with_port(9);
        let config = StreamConfig::default()
            .with_reconnect_delays(Duration::from_secs(60), Duration::from_secs(60));
        let (mut connector, _rx) = StreamConnector::with_channel(device, config).unwrap();

        assert!(connector.is_running());
        assert_eq!(
            connector.endpoint(),
            "http://127.0.0.1:9/ISAPI/Event/notification/alertStream"
        );
        assert_eq!(connector.device_name(), "127.0.0.1");

        connector.shutdown().await.unwrap();
        assert!(!connector.is_running());
        assert_eq!(connector.state(), ConnectionState::Disconnected);

        connector.shutdown().await.unwrap();
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }
}
