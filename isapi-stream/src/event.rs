//! Signals delivered to the consumer of an alert stream.

use crate::types::CanonicalEvent;

/// Everything a [`StreamConnector`](crate::StreamConnector) reports.
///
/// Signals for one connector are delivered in the order they occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The device accepted the request and the stream is open.
    Connected,

    /// The device closed the stream without an error.
    Disconnected,

    /// Connecting failed, or the open stream failed or stalled.
    Error { detail: String },

    /// A canonical event transition.
    Alarm(CanonicalEvent),
}

impl Signal {
    pub fn error(detail: impl Into<String>) -> Self {
        Signal::Error {
            detail: detail.into(),
        }
    }

    /// The alarm carried by this signal, if any.
    pub fn as_alarm(&self) -> Option<&CanonicalEvent> {
        match self {
            Signal::Alarm(event) => Some(event),
            _ => None,
        }
    }

    /// Whether this signal describes the connection rather than an event.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Signal::Alarm(_))
    }
}

impl From<CanonicalEvent> for Signal {
    fn from(event: CanonicalEvent) -> Self {
        Signal::Alarm(event)
    }
}
