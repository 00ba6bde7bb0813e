//! `EventNotificationAlert` parser implementation

use serde::{Deserialize, Serialize};

use crate::common::xml_decode;
use crate::error::{ParseError, ParseResult};

/// Root element name of an alert stream notification.
pub const ROOT_ELEMENT: &str = "EventNotificationAlert";

/// Event type reported when the device leaves `eventType` out.
const UNKNOWN_EVENT_TYPE: &str = "Unknown";

/// Serde view of one alert notification.
///
/// A typical document:
/// ```xml
/// <EventNotificationAlert version="2.0" xmlns="http://www.hikvision.com/ver20/XMLSchema">
///   <ipAddress>192.168.1.64</ipAddress>
///   <channelID>1</channelID>
///   <dateTime>2024-03-01T10:15:02+01:00</dateTime>
///   <activePostCount>1</activePostCount>
///   <eventType>VMD</eventType>
///   <eventState>active</eventState>
///   <eventDescription>Motion alarm</eventDescription>
/// </EventNotificationAlert>
/// ```
///
/// All fields are optional here; defaults are applied by [`RawAlert::try_from`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename = "EventNotificationAlert")]
pub struct EventNotificationAlert {
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,

    /// `active` or `inactive`
    #[serde(rename = "eventState", default)]
    pub event_state: Option<String>,

    /// Physical channel, present on cameras and most NVR events
    #[serde(rename = "channelID", default)]
    pub channel_id: Option<String>,

    /// Digital channel, used by NVRs for IP channels
    #[serde(rename = "dynChannelID", default)]
    pub dyn_channel_id: Option<String>,

    #[serde(rename = "activePostCount", default)]
    pub active_post_count: Option<String>,

    #[serde(rename = "ipAddress", default)]
    pub ip_address: Option<String>,

    #[serde(rename = "dateTime", default)]
    pub date_time: Option<String>,

    #[serde(rename = "eventDescription", default)]
    pub event_description: Option<String>,
}

impl EventNotificationAlert {
    /// Parse a notification document.
    ///
    /// Fails if the document is malformed or its root is not
    /// `EventNotificationAlert`.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        let document = xml_decode::parse_document(xml)?;
        if document.root != ROOT_ELEMENT {
            return Err(ParseError::UnexpectedRoot {
                expected: ROOT_ELEMENT,
                found: document.root,
            });
        }
        document.deserialize()
    }
}

/// Device-reported state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventState {
    Active,
    Inactive,
}

impl EventState {
    /// Anything other than `active` counts as inactive.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("active") => EventState::Active,
            _ => EventState::Inactive,
        }
    }

    pub fn is_active(self) -> bool {
        self == EventState::Active
    }
}

/// The fields of one notification that event tracking consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAlert {
    /// Vendor event code, e.g. `VMD`
    pub event_type: String,
    pub event_state: EventState,
    /// `channelID`, else `dynChannelID`, else 0
    pub channel: u32,
    /// Number of currently active entries; 0 means nothing is active
    pub active_post_count: u32,
}

impl RawAlert {
    pub fn new(
        event_type: impl Into<String>,
        event_state: EventState,
        channel: u32,
        active_post_count: u32,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            event_state,
            channel,
            active_post_count,
        }
    }
}

impl TryFrom<EventNotificationAlert> for RawAlert {
    type Error = ParseError;

    fn try_from(alert: EventNotificationAlert) -> ParseResult<Self> {
        let event_type = non_empty(alert.event_type.as_deref())
            .unwrap_or(UNKNOWN_EVENT_TYPE)
            .to_string();

        let channel = match non_empty(alert.channel_id.as_deref()) {
            Some(value) => parse_count("channelID", value)?,
            None => match non_empty(alert.dyn_channel_id.as_deref()) {
                Some(value) => parse_count("dynChannelID", value)?,
                None => 0,
            },
        };

        let active_post_count = non_empty(alert.active_post_count.as_deref())
            .map(|value| parse_count("activePostCount", value))
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            event_type,
            event_state: EventState::from_wire(alert.event_state.as_deref()),
            channel,
            active_post_count,
        })
    }
}

/// Parse one alert frame as received from the stream.
pub fn parse_alert(frame: &[u8]) -> ParseResult<RawAlert> {
    let xml =
        std::str::from_utf8(frame).map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;
    RawAlert::try_from(EventNotificationAlert::from_xml(xml)?)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_count(field: &'static str, value: &str) -> ParseResult<u32> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        field,
        value: value.to_string(),
    })
}
