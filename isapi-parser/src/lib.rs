//! # isapi-parser
//!
//! XML parsing for Hikvision ISAPI alert stream notifications, plus the
//! normalization of vendor event codes into the canonical taxonomy used by
//! consumers.
//!
//! ## Usage
//!
//! ### Top-level convenience access
//! ```rust
//! use isapi_parser::{normalize, parse_alert};
//!
//! let frame = b"<EventNotificationAlert><eventType>VMD</eventType></EventNotificationAlert>";
//! let alert = parse_alert(frame).unwrap();
//! assert_eq!(normalize(&alert.event_type), "VideoMotion");
//! ```
//!
//! ### Module access
//! ```rust
//! use isapi_parser::alert::EventNotificationAlert;
//! use isapi_parser::common::xml_decode::strip_namespaces;
//! ```

pub mod alert;
pub mod codes;
pub mod common;
pub mod error;

pub use error::{ParseError, ParseResult};

pub use alert::{parse_alert, EventNotificationAlert, EventState, RawAlert};
pub use codes::{is_canonical, normalize, CODE_TABLE};
