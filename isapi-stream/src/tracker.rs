//! Start/stop synthesis for noisy alert notifications.
//!
//! Devices re-announce an ongoing event every second or so while it stays
//! true, and rarely send a per-channel stop. The tracker turns that stream
//! into one `Start` per (code, channel) and a `Stop` when either the device
//! declares that nothing is active (`activePostCount == 0`) or the event has
//! not been re-announced for longer than the staleness window.
//!
//! Staleness is evaluated when a repeat notification arrives, so the
//! tracker needs no timer of its own. The connector bounds the no-traffic
//! case with its idle timeout and drains the tracker when a session ends.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use isapi_parser::RawAlert;

use crate::types::{CanonicalEvent, EventAction};

/// Default staleness window.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(2);

type EventKey = (String, u32);

/// An event the tracker currently considers ongoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEventRecord {
    pub code: String,
    pub channel: u32,
    /// When the device last reported this event
    pub last_seen: Instant,
}

/// De-duplication and timeout engine for one connection.
///
/// Records are kept in key order, which makes every multi-event emission
/// (stop-all, sweep, drain) deterministic.
#[derive(Debug)]
pub struct ActiveEventTracker {
    records: BTreeMap<EventKey, ActiveEventRecord>,
    staleness_window: Duration,
}

impl Default for ActiveEventTracker {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS_WINDOW)
    }
}

impl ActiveEventTracker {
    pub fn new(staleness_window: Duration) -> Self {
        Self {
            records: BTreeMap::new(),
            staleness_window,
        }
    }

    /// Feed one notification, with `code` already normalized.
    pub fn observe(&mut self, alert: &RawAlert, code: &str) -> Vec<CanonicalEvent> {
        self.observe_at(alert, code, Instant::now())
    }

    /// [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(&mut self, alert: &RawAlert, code: &str, now: Instant) -> Vec<CanonicalEvent> {
        let action = if alert.event_state.is_active() {
            EventAction::Start
        } else {
            EventAction::Stop
        };

        if alert.active_post_count == 0 {
            if self.is_forced_active() {
                return self.drain();
            }
            // Nothing tracked: report the transition exactly as the device did.
            return vec![CanonicalEvent::new(code, action, alert.channel)];
        }

        let key = (code.to_string(), alert.channel);
        match self.records.get_mut(&key) {
            None => {
                self.records.insert(
                    key,
                    ActiveEventRecord {
                        code: code.to_string(),
                        channel: alert.channel,
                        last_seen: now,
                    },
                );
                vec![CanonicalEvent::start(code, alert.channel)]
            }
            Some(record) => {
                record.last_seen = now;
                self.sweep(now)
            }
        }
    }

    /// Stop and remove every record older than the staleness window.
    fn sweep(&mut self, now: Instant) -> Vec<CanonicalEvent> {
        let window = self.staleness_window;
        let mut stopped = Vec::new();

        self.records.retain(|_, record| {
            let stale = now.saturating_duration_since(record.last_seen) > window;
            if stale {
                stopped.push(CanonicalEvent::stop(record.code.clone(), record.channel));
            }
            !stale
        });

        stopped
    }

    /// Stop every tracked event and forget it.
    pub fn drain(&mut self) -> Vec<CanonicalEvent> {
        std::mem::take(&mut self.records)
            .into_values()
            .map(|record| CanonicalEvent::stop(record.code, record.channel))
            .collect()
    }

    /// Whether any event is currently being held active.
    pub fn is_forced_active(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn is_active(&self, code: &str, channel: u32) -> bool {
        self.records.contains_key(&(code.to_string(), channel))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ActiveEventRecord> {
        self.records.values()
    }

    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isapi_parser::EventState;
    use proptest::prelude::*;

    fn active(event_type: &str, channel: u32) -> RawAlert {
        RawAlert::new(event_type, EventState::Active, channel, 1)
    }

    fn idle(event_type: &str, state: EventState) -> RawAlert {
        RawAlert::new(event_type, state, 0, 0)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_first_active_report_starts() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        let events = tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);

        assert_eq!(events, vec![CanonicalEvent::start("VideoMotion", 1)]);
        assert!(tracker.is_active("VideoMotion", 1));
        assert!(tracker.is_forced_active());
    }

    #[test]
    fn test_repeats_within_window_are_silent() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        for step in 1..10 {
            let events = tracker.observe_at(&active("VMD", 1), "VideoMotion", t0 + ms(500 * step));
            assert!(events.is_empty(), "repeat {} emitted {:?}", step, events);
        }
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_zero_post_count_stops_everything() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 2), "VideoMotion", t0);
        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        tracker.observe_at(&active("IO", 1), "AlarmLocal", t0);

        let events = tracker.observe_at(&idle("videoloss", EventState::Inactive), "VideoLoss", t0 + ms(100));

        assert_eq!(
            events,
            vec![
                CanonicalEvent::stop("AlarmLocal", 1),
                CanonicalEvent::stop("VideoMotion", 1),
                CanonicalEvent::stop("VideoMotion", 2),
            ]
        );
        assert!(tracker.is_empty());
        assert!(!tracker.is_forced_active());
    }

    #[test]
    fn test_zero_post_count_passes_through_when_idle() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        let events = tracker.observe_at(&idle("videoloss", EventState::Inactive), "VideoLoss", t0);
        assert_eq!(events, vec![CanonicalEvent::stop("VideoLoss", 0)]);

        let events = tracker.observe_at(&idle("IO", EventState::Active), "AlarmLocal", t0);
        assert_eq!(events, vec![CanonicalEvent::start("AlarmLocal", 0)]);

        assert!(tracker.is_empty());
    }

    #[test]
    fn test_stale_record_stops_exactly_once() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        tracker.observe_at(&active("IO", 3), "AlarmLocal", t0);

        // exactly at the window boundary nothing expires
        let events = tracker.observe_at(&active("IO", 3), "AlarmLocal", t0 + ms(2000));
        assert!(events.is_empty());

        let events = tracker.observe_at(&active("IO", 3), "AlarmLocal", t0 + ms(2001));
        assert_eq!(events, vec![CanonicalEvent::stop("VideoMotion", 1)]);

        let events = tracker.observe_at(&active("IO", 3), "AlarmLocal", t0 + ms(2500));
        assert!(events.is_empty());
        assert!(!tracker.is_active("VideoMotion", 1));
        assert!(tracker.is_active("AlarmLocal", 3));
    }

    #[test]
    fn test_new_key_does_not_sweep() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        let events = tracker.observe_at(&active("IO", 1), "AlarmLocal", t0 + ms(5000));

        assert_eq!(events, vec![CanonicalEvent::start("AlarmLocal", 1)]);
        assert!(tracker.is_active("VideoMotion", 1));
    }

    #[test]
    fn test_stopped_key_can_start_again() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        tracker.observe_at(&idle("VMD", EventState::Inactive), "VideoMotion", t0 + ms(300));

        let events = tracker.observe_at(&active("VMD", 1), "VideoMotion", t0 + ms(600));
        assert_eq!(events, vec![CanonicalEvent::start("VideoMotion", 1)]);
    }

    #[test]
    fn test_two_channels_expire_independently() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();
        let mut emitted = Vec::new();

        emitted.extend(tracker.observe_at(&active("VMD", 1), "VideoMotion", t0));
        emitted.extend(tracker.observe_at(&active("VMD", 2), "VideoMotion", t0 + ms(100)));

        // channel 1 repeats every 500ms for 3s, channel 2 stays silent
        let mut stop_at = None;
        for step in 1..=6 {
            let now = t0 + ms(500 * step);
            let events = tracker.observe_at(&active("VMD", 1), "VideoMotion", now);
            if !events.is_empty() && stop_at.is_none() {
                stop_at = Some(now);
            }
            emitted.extend(events);
        }

        assert_eq!(
            emitted,
            vec![
                CanonicalEvent::start("VideoMotion", 1),
                CanonicalEvent::start("VideoMotion", 2),
                CanonicalEvent::stop("VideoMotion", 2),
            ]
        );
        // channel 2 was last seen at 100ms, so the first repeat after 2.1s stops it
        assert_eq!(stop_at, Some(t0 + ms(2500)));
        assert!(tracker.is_active("VideoMotion", 1));
        assert!(!tracker.is_active("VideoMotion", 2));
    }

    #[test]
    fn test_same_code_different_channels_are_distinct() {
        let mut tracker = ActiveEventTracker::default();
        let t0 = Instant::now();

        assert_eq!(tracker.observe_at(&active("VMD", 1), "VideoMotion", t0).len(), 1);
        assert_eq!(tracker.observe_at(&active("VMD", 11), "VideoMotion", t0).len(), 1);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_drain() {
        let mut tracker = ActiveEventTracker::new(ms(500));
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        tracker.observe_at(&active("shelteralarm", 1), "VideoBlind", t0);

        assert_eq!(
            tracker.drain(),
            vec![
                CanonicalEvent::stop("VideoBlind", 1),
                CanonicalEvent::stop("VideoMotion", 1),
            ]
        );
        assert!(tracker.is_empty());
        assert!(tracker.drain().is_empty());
    }

    #[test]
    fn test_custom_window() {
        let mut tracker = ActiveEventTracker::new(ms(500));
        let t0 = Instant::now();

        tracker.observe_at(&active("VMD", 1), "VideoMotion", t0);
        tracker.observe_at(&active("VMD", 2), "VideoMotion", t0);
        let events = tracker.observe_at(&active("VMD", 2), "VideoMotion", t0 + ms(501));

        assert_eq!(events, vec![CanonicalEvent::stop("VideoMotion", 1)]);
    }

    proptest! {
        /// With only active reports, each key alternates Start, Stop, Start, ...
        #[test]
        fn prop_at_most_one_start_per_key(
            steps in proptest::collection::vec((0u32..3, 0u64..3000), 1..60)
        ) {
            let mut tracker = ActiveEventTracker::default();
            let t0 = Instant::now();
            let mut elapsed = 0u64;
            let mut open = std::collections::HashMap::<u32, bool>::new();

            for (channel, advance) in steps {
                elapsed += advance;
                let events = tracker.observe_at(&active("VMD", channel), "VideoMotion", t0 + ms(elapsed));
                for event in events {
                    let is_open = open.entry(event.channel).or_insert(false);
                    match event.action {
                        EventAction::Start => {
                            prop_assert!(!*is_open, "second Start for channel {}", event.channel);
                        }
                        EventAction::Stop => {
                            prop_assert!(*is_open, "Stop without Start for channel {}", event.channel);
                        }
                    }
                    *is_open = event.action == EventAction::Start;
                }
                prop_assert!(tracker.is_active("VideoMotion", channel));
            }
        }
    }
}
