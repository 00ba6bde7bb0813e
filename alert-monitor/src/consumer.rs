//! Signal consumption and display.
//!
//! [`AlarmConsumer`] turns the connector's signals into what a home
//! automation consumer acts on: device availability, and named triggers for
//! alarms whose code is in the canonical table.

use std::fmt;

use chrono::Local;
use isapi_parser::is_canonical;
use isapi_stream::{CanonicalEvent, Signal};
use tracing::{debug, info, warn};

/// Whether the device is currently reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Nothing received yet
    Unknown,
    Available,
    Unavailable { reason: String },
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Unknown => f.write_str("unknown"),
            Availability::Available => f.write_str("available"),
            Availability::Unavailable { reason } => write!(f, "unavailable ({reason})"),
        }
    }
}

/// Named trigger for a canonical alarm, e.g. `VideoMotionStart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub name: String,
    pub channel: u32,
}

impl Trigger {
    /// Trigger for an alarm, or `None` when its code is not canonical.
    pub fn for_event(event: &CanonicalEvent) -> Option<Self> {
        is_canonical(&event.code).then(|| Trigger {
            name: format!("{}{}", event.code, event.action.as_str()),
            channel: event.channel,
        })
    }
}

/// Result of handling one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerUpdate {
    AvailabilityChanged(Availability),
    Trigger(Trigger),
    /// An alarm with a code outside the canonical table
    Unmapped(CanonicalEvent),
}

/// Counters over the signals handled so far
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SignalStats {
    pub total_signals: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub errors: u64,
    pub triggers: u64,
    pub unmapped_alarms: u64,
}

impl SignalStats {
    pub fn summary(&self) -> String {
        format!(
            "Signals: {} total, {} triggers, {} unmapped, {} connects, {} disconnects, {} errors",
            self.total_signals,
            self.triggers,
            self.unmapped_alarms,
            self.connects,
            self.disconnects,
            self.errors
        )
    }
}

/// Tracks availability for one device and maps alarms to triggers.
#[derive(Debug)]
pub struct AlarmConsumer {
    device: String,
    availability: Availability,
    stats: SignalStats,
}

impl AlarmConsumer {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            availability: Availability::Unknown,
            stats: SignalStats::default(),
        }
    }

    /// Apply one signal. Availability updates are reported only on change.
    pub fn handle(&mut self, signal: &Signal) -> Option<ConsumerUpdate> {
        self.stats.total_signals += 1;

        match signal {
            Signal::Connected => {
                self.stats.connects += 1;
                self.set_availability(Availability::Available)
            }
            Signal::Disconnected => {
                self.stats.disconnects += 1;
                self.set_availability(Availability::Unavailable {
                    reason: "stream closed by device".to_string(),
                })
            }
            Signal::Error { detail } => {
                self.stats.errors += 1;
                warn!(device = %self.device, error = %detail, "Alert stream error");
                self.set_availability(Availability::Unavailable {
                    reason: detail.clone(),
                })
            }
            Signal::Alarm(event) => match Trigger::for_event(event) {
                Some(trigger) => {
                    self.stats.triggers += 1;
                    debug!(device = %self.device, trigger = %trigger.name, channel = trigger.channel, "Trigger");
                    Some(ConsumerUpdate::Trigger(trigger))
                }
                None => {
                    self.stats.unmapped_alarms += 1;
                    Some(ConsumerUpdate::Unmapped(event.clone()))
                }
            },
        }
    }

    fn set_availability(&mut self, availability: Availability) -> Option<ConsumerUpdate> {
        if self.availability == availability {
            return None;
        }
        info!(device = %self.device, %availability, "Availability changed");
        self.availability = availability.clone();
        Some(ConsumerUpdate::AvailabilityChanged(availability))
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn stats(&self) -> &SignalStats {
        &self.stats
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

/// Formats updates for the terminal.
#[derive(Debug, Clone)]
pub struct UpdateFormatter {
    use_colors: bool,
}

impl UpdateFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    pub fn format(&self, device: &str, update: &ConsumerUpdate) -> String {
        let timestamp = Local::now().format("%H:%M:%S%.3f");

        let body = match update {
            ConsumerUpdate::AvailabilityChanged(Availability::Available) => {
                self.colorize("● available", "32")
            }
            ConsumerUpdate::AvailabilityChanged(availability) => {
                self.colorize(&format!("○ {availability}"), "31")
            }
            ConsumerUpdate::Trigger(trigger) => self.colorize(
                &format!("▶ {} (channel {})", trigger.name, trigger.channel),
                "33",
            ),
            ConsumerUpdate::Unmapped(event) => format!("· {event} (no trigger)"),
        };

        format!("[{timestamp}] {device}: {body}")
    }

    fn colorize(&self, text: &str, code: &str) -> String {
        if self.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }
}
