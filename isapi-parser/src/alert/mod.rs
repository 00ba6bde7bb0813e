//! Alert stream notification parser
//!
//! Every document pushed on `/ISAPI/Event/notification/alertStream` is an
//! `EventNotificationAlert`. This module deserializes one such document and
//! reduces it to the [`RawAlert`] fields event tracking needs.
//!
//! ```rust
//! use isapi_parser::alert::{parse_alert, EventState};
//!
//! let frame = br#"<EventNotificationAlert><eventType>VMD</eventType><eventState>active</eventState><channelID>2</channelID><activePostCount>1</activePostCount></EventNotificationAlert>"#;
//! let alert = parse_alert(frame).unwrap();
//! assert_eq!(alert.event_state, EventState::Active);
//! assert_eq!(alert.channel, 2);
//! ```

pub mod parser;

pub use parser::{parse_alert, EventNotificationAlert, EventState, RawAlert, ROOT_ELEMENT};
