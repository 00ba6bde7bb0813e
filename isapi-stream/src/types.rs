//! Core types for the isapi-stream crate.

use std::fmt;

/// Transition reported to consumers for an event.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum EventAction {
    Start,
    Stop,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Start => "Start",
            EventAction::Stop => "Stop",
        }
    }
}

impl fmt::Display for EventAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized start/stop transition for one event type on one channel.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct CanonicalEvent {
    /// Canonical event code, e.g. `VideoMotion`
    pub code: String,
    pub action: EventAction,
    /// Device channel the event belongs to
    pub channel: u32,
}

impl CanonicalEvent {
    pub fn new(code: impl Into<String>, action: EventAction, channel: u32) -> Self {
        Self {
            code: code.into(),
            action,
            channel,
        }
    }

    pub fn start(code: impl Into<String>, channel: u32) -> Self {
        Self::new(code, EventAction::Start, channel)
    }

    pub fn stop(code: impl Into<String>, channel: u32) -> Self {
        Self::new(code, EventAction::Stop, channel)
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (channel {})", self.code, self.action, self.channel)
    }
}

/// Lifecycle state of a [`StreamConnector`](crate::StreamConnector).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ConnectionState {
    /// Not running; initial state and the state after shutdown
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// Response headers received, frames are being consumed
    Streaming,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
