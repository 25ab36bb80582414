//! Duty-cycle integration over a device's event log.
//!
//! The integrator reconstructs when a device was on within a [`Window`] from
//! its append-only on/off events, then weights those intervals with the
//! power model.
//!
//! # State at the window start
//!
//! 1. The `to` of the latest event at or before the window start.
//! 2. Otherwise the `from` of the first event inside the window. When that
//!    says on and the device's last activity predates the event, the device
//!    counts as on from its last activity clamped to the window start.
//! 3. Otherwise the device's stored `on` flag, counted from its last
//!    activity clamped to the window start. A device with no recorded
//!    activity at all is treated as off.
//!
//! Events after the window end, including ones stamped in the future, never
//! influence the window.
//!
//! Events never need to alternate: repeated `to: true` events simply keep
//! the device on. Events that precede the running cursor (clock skew,
//! out-of-order writes) contribute zero time instead of negative time.

use chrono::{DateTime, Datelike, NaiveTime, TimeDelta, Utc};
use tracing::debug;

use crate::model::{Device, DeviceEvent};
use crate::power::{next_power_change, power_watts};

/// A time interval `[start, end]` to integrate over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// From UTC midnight of `now`'s day up to `now`.
    pub fn today(now: DateTime<Utc>) -> Self {
        Self::new(midnight(now), now)
    }

    /// From the first day of `now`'s month up to `now`.
    pub fn month_to_date(now: DateTime<Utc>) -> Self {
        let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
        Self::new(first.and_time(NaiveTime::MIN).and_utc(), now)
    }

    /// From January 1st of `now`'s year up to `now`.
    pub fn year_to_date(now: DateTime<Utc>) -> Self {
        let first = now.date_naive().with_ordinal(1).unwrap_or(now.date_naive());
        Self::new(first.and_time(NaiveTime::MIN).and_utc(), now)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// UTC midnight of the day containing `now`.
pub fn midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// A maximal stretch of time during which a device was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OnInterval {
    pub fn seconds(&self) -> f64 {
        seconds_between(self.start, self.end)
    }
}

/// Reconstruct the intervals during which `device` was on inside `window`.
///
/// `events` may contain other devices' events; they are ignored.
pub fn on_intervals(device: &Device, events: &[DeviceEvent], window: Window) -> Vec<OnInterval> {
    let mut intervals = Vec::new();
    if window.is_empty() {
        return intervals;
    }

    let own = || events.iter().filter(|e| e.device_id == device.id);

    // Latest event at or before the window start; the later entry wins on ties.
    let prior = own()
        .filter(|e| e.at <= window.start)
        .fold(None::<&DeviceEvent>, |best, e| match best {
            Some(b) if b.at > e.at => Some(b),
            _ => Some(e),
        });
    let first_inside = own().find(|e| e.at > window.start && e.at <= window.end);

    let (mut on, mut cursor) = match (prior, first_inside) {
        (Some(event), _) => (event.to, window.start),
        (None, Some(first)) => {
            let since = device
                .last_active
                .filter(|last_active| *last_active < first.at)
                .map_or(window.start, |last_active| last_active.max(window.start));
            (first.from, since)
        }
        (None, None) => match device.last_active {
            Some(last_active) if device.state.is_on() => (true, last_active.max(window.start)),
            _ => (false, window.start),
        },
    };

    for event in own().filter(|e| e.at > window.start && e.at <= window.end) {
        if event.at < cursor {
            debug!(
                device_id = device.id,
                event_at = %event.at,
                cursor = %cursor,
                "Event precedes integration cursor; clamped to zero duration"
            );
        } else if on && event.at > cursor {
            intervals.push(OnInterval {
                start: cursor,
                end: event.at,
            });
        }
        on = event.to;
        cursor = cursor.max(event.at);
    }

    if on && window.end > cursor {
        intervals.push(OnInterval {
            start: cursor,
            end: window.end,
        });
    }

    intervals
}

/// Total seconds `device` was on inside `window`.
pub fn seconds_on(device: &Device, events: &[DeviceEvent], window: Window) -> f64 {
    on_intervals(device, events, window)
        .iter()
        .map(OnInterval::seconds)
        .sum()
}

/// Energy in watt-hours drawn by `device` while on inside `window`.
///
/// Each on interval is split wherever the power model's clock-dependent
/// terms change, so fridge duty cycles and the AC daytime bump are
/// integrated exactly rather than from a single snapshot.
pub fn energy_wh(device: &Device, events: &[DeviceEvent], window: Window) -> f64 {
    let state = device.state.with_on(true);

    on_intervals(device, events, window)
        .iter()
        .map(|interval| {
            let mut wh = 0.0;
            let mut t = interval.start;
            while t < interval.end {
                let next = next_power_change(&state, t)
                    .filter(|n| *n < interval.end)
                    .unwrap_or(interval.end);
                let watts = power_watts(&state, device.rating_watts, t);
                wh += f64::from(watts) * seconds_between(t, next) / 3600.0;
                t = next;
            }
            wh
        })
        .sum()
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    if delta <= TimeDelta::zero() {
        return 0.0;
    }
    delta.num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AcState, DeviceKind, DeviceState, FridgeState, LightState, SwitchState};
    use chrono::TimeZone;

    fn t(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, minute, second).unwrap()
    }

    fn device(state: DeviceState, rating_watts: i64, last_active: Option<DateTime<Utc>>) -> Device {
        Device {
            id: 1,
            name: "Test device".to_string(),
            room_id: 1,
            room_name: "Lab".to_string(),
            state,
            rating_watts,
            last_active,
        }
    }

    fn plug(on: bool, last_active: Option<DateTime<Utc>>) -> Device {
        device(DeviceState::Plug(SwitchState { on }), 1000, last_active)
    }

    fn event(from: bool, to: bool, at: DateTime<Utc>) -> DeviceEvent {
        DeviceEvent {
            device_id: 1,
            from,
            to,
            at,
        }
    }

    #[test]
    fn test_empty_history_and_off_is_zero() {
        let d = plug(false, Some(t(8, 0, 0)));
        let window = Window::new(t(0, 0, 0), t(12, 0, 0));
        assert_eq!(seconds_on(&d, &[], window), 0.0);
        assert_eq!(energy_wh(&d, &[], window), 0.0);
    }

    #[test]
    fn test_on_since_last_active() {
        let last_active = t(10, 0, 0);
        let now = t(11, 1, 1);
        let d = plug(true, Some(last_active));

        let exact = seconds_on(&d, &[], Window::new(last_active, now));
        assert!((exact - 3661.0).abs() < 1e-9);

        // Earlier window starts are clamped to the last activity.
        let today = seconds_on(&d, &[], Window::new(t(0, 0, 0), now));
        assert!((today - 3661.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_activity_record_means_off() {
        let d = plug(true, None);
        assert_eq!(seconds_on(&d, &[], Window::new(t(0, 0, 0), t(12, 0, 0))), 0.0);
    }

    #[test]
    fn test_state_from_prior_event() {
        let d = plug(false, Some(t(11, 0, 0)));
        let events = vec![
            event(false, true, t(6, 0, 0)),
            event(true, false, t(9, 0, 0)),
            event(false, true, t(10, 0, 0)),
            event(true, false, t(11, 0, 0)),
        ];
        let window = Window::new(t(8, 0, 0), t(12, 0, 0));
        let intervals = on_intervals(&d, &events, window);
        assert_eq!(
            intervals,
            vec![
                OnInterval {
                    start: t(8, 0, 0),
                    end: t(9, 0, 0),
                },
                OnInterval {
                    start: t(10, 0, 0),
                    end: t(11, 0, 0),
                },
            ]
        );
        assert!((seconds_on(&d, &events, window) - 7200.0).abs() < 1e-9);
        assert!((energy_wh(&d, &events, window) - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_event_in_window_sets_initial_state() {
        // Turned off at 09:00 with no earlier event: on since the window start.
        let d = plug(false, Some(t(9, 0, 0)));
        let events = vec![event(true, false, t(9, 0, 0))];
        let window = Window::new(t(8, 0, 0), t(12, 0, 0));
        assert!((seconds_on(&d, &events, window) - 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent_toggles_are_tolerated() {
        let d = plug(true, Some(t(10, 0, 0)));
        let events = vec![
            event(false, true, t(8, 0, 0)),
            event(true, true, t(9, 0, 0)),
            event(true, true, t(10, 0, 0)),
        ];
        let window = Window::new(t(8, 0, 0), t(11, 0, 0));
        assert!((seconds_on(&d, &events, window) - 3.0 * 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_events_never_go_negative() {
        let d = plug(false, Some(t(10, 0, 0)));
        let events = vec![
            event(false, true, t(9, 0, 0)),
            event(true, false, t(8, 30, 0)),
            event(false, true, t(9, 30, 0)),
            event(true, false, t(10, 0, 0)),
        ];
        let window = Window::new(t(8, 0, 0), t(12, 0, 0));
        let seconds = seconds_on(&d, &events, window);
        assert!(seconds >= 0.0);
        // 09:30 to 10:00 is the only positive stretch.
        assert!((seconds - 1800.0).abs() < 1e-9);
    }

    #[test]
    fn test_events_after_window_end_are_ignored() {
        let d = plug(true, Some(t(9, 0, 0)));
        let events = vec![
            event(false, true, t(9, 0, 0)),
            event(true, false, t(13, 0, 0)),
        ];
        let window = Window::new(t(0, 0, 0), t(10, 0, 0));
        assert!((seconds_on(&d, &events, window) - 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_event_does_not_set_initial_state() {
        // Clock-skewed event stamped an hour after now.
        let now = t(14, 0, 0);
        let events = vec![event(true, false, t(15, 0, 0))];

        let off = plug(false, Some(t(10, 0, 0)));
        assert_eq!(seconds_on(&off, &events, Window::today(now)), 0.0);
        assert_eq!(energy_wh(&off, &events, Window::today(now)), 0.0);

        // The stored flag still applies, from the last activity.
        let on = plug(true, Some(t(10, 0, 0)));
        assert!((seconds_on(&on, &events, Window::today(now)) - 14_400.0).abs() < 1e-9);
        assert!((energy_wh(&on, &events, Window::today(now)) - 4000.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_event_on_since_earlier_last_active() {
        let d = plug(false, Some(t(9, 0, 0)));
        let events = vec![event(true, false, t(11, 0, 0))];
        let window = Window::new(t(8, 0, 0), t(12, 0, 0));
        assert_eq!(
            on_intervals(&d, &events, window),
            vec![OnInterval {
                start: t(9, 0, 0),
                end: t(11, 0, 0),
            }]
        );
    }

    #[test]
    fn test_other_devices_events_are_ignored() {
        let d = plug(false, Some(t(9, 0, 0)));
        let events = vec![DeviceEvent {
            device_id: 99,
            from: false,
            to: true,
            at: t(9, 0, 0),
        }];
        assert_eq!(seconds_on(&d, &events, Window::new(t(0, 0, 0), t(12, 0, 0))), 0.0);
    }

    #[test]
    fn test_empty_window() {
        let d = plug(true, Some(t(1, 0, 0)));
        assert!(on_intervals(&d, &[], Window::new(t(9, 0, 0), t(9, 0, 0))).is_empty());
        assert!(on_intervals(&d, &[], Window::new(t(9, 0, 0), t(8, 0, 0))).is_empty());
    }

    #[test]
    fn test_fridge_energy_follows_compressor_cycle() {
        let fridge = device(
            DeviceState::Fridge(FridgeState {
                on: true,
                door_open: false,
                eco: false,
            }),
            150,
            Some(t(9, 0, 0)),
        );
        // 3 minutes at 120 W then 7 minutes at 8 W.
        let wh = energy_wh(&fridge, &[], Window::new(t(9, 0, 0), t(9, 10, 0)));
        let expected = 120.0 * 3.0 / 60.0 + 8.0 * 7.0 / 60.0;
        assert!((wh - expected).abs() < 1e-9, "{wh} != {expected}");

        // Starting mid-cycle splits at the next boundary.
        let wh = energy_wh(&fridge, &[], Window::new(t(9, 2, 30), t(9, 4, 0)));
        let expected = 120.0 * 30.0 / 3600.0 + 8.0 * 60.0 / 3600.0;
        assert!((wh - expected).abs() < 1e-9, "{wh} != {expected}");
    }

    #[test]
    fn test_ac_energy_splits_at_noon() {
        let ac = device(
            DeviceState::Ac(AcState::new(true, 24)),
            900,
            Some(t(11, 0, 0)),
        );
        let wh = energy_wh(&ac, &[], Window::new(t(11, 0, 0), t(13, 0, 0)));
        assert!((wh - (700.0 + 900.0)).abs() < 1e-9, "{wh}");
    }

    #[test]
    fn test_energy_is_monotonic_in_window_end() {
        let fridge = device(
            DeviceState::default_for(DeviceKind::Fridge),
            150,
            Some(t(0, 0, 0)),
        );
        let light = device(
            DeviceState::Light(LightState::new(true, 60, 9)),
            9,
            Some(t(3, 0, 0)),
        );
        let events = vec![
            event(true, false, t(5, 0, 0)),
            event(false, true, t(6, 17, 0)),
            event(true, true, t(7, 0, 0)),
        ];
        for d in [fridge, light] {
            let mut previous = 0.0;
            for minutes in (0..=12 * 60).step_by(7) {
                let end = t(0, 0, 0) + TimeDelta::minutes(minutes);
                let wh = energy_wh(&d, &events, Window::new(t(0, 0, 0), end));
                assert!(wh >= previous, "energy dropped at +{minutes} min");
                previous = wh;
            }
        }
    }

    #[test]
    fn test_window_helpers() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 30, 0).unwrap();
        assert_eq!(Window::today(now).start, t(0, 0, 0));
        assert_eq!(
            Window::month_to_date(now).start,
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Window::year_to_date(now).start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(Window::year_to_date(now).end, now);
    }
}
