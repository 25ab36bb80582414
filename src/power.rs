//! Instantaneous power model.
//!
//! Power is a pure function of a device's typed state, its nominal rating and
//! the wall-clock instant. Two types depend on the clock:
//!
//! - AC units draw an extra 200 W between 12:00 and 18:59
//! - fridge compressors run for the first three minutes of every ten
//!
//! All rounding is half away from zero (`f64::round`), so a 9 W bulb at 50%
//! draws 5 W.

use chrono::{DateTime, TimeDelta, Timelike, Utc};

use crate::model::{DeviceState, WasherPhase};

/// Hard ceiling for an AC unit, whatever the setpoint and time of day.
pub const AC_MAX_WATTS: u32 = 1200;
const AC_BASE_WATTS: u32 = 700;
const AC_COOL_SETPOINT_BELOW: i64 = 22;
const AC_COOL_EXTRA_WATTS: u32 = 250;
const AC_DAYTIME_EXTRA_WATTS: u32 = 200;
const AC_DAYTIME_START_HOUR: u32 = 12;
/// First hour after the daytime bump.
const AC_DAYTIME_END_HOUR: u32 = 19;

const TV_MIN_WATTS: u32 = 20;

const PC_STANDBY_WATTS: u32 = 5;
const PC_IDLE_WATTS: f64 = 60.0;
const PC_MAX_WATTS: f64 = 250.0;

const SPEAKER_BASE_WATTS: f64 = 3.0;
const SPEAKER_WATTS_PER_VOLUME: f64 = 0.25;

const FRIDGE_COMPRESSOR_WATTS: u32 = 120;
const FRIDGE_IDLE_WATTS: u32 = 8;
const FRIDGE_DOOR_OPEN_EXTRA_WATTS: u32 = 20;
const FRIDGE_ECO_FACTOR: f64 = 0.9;
const FRIDGE_CYCLE_MINUTES: u32 = 10;
const FRIDGE_COMPRESSOR_MINUTES: u32 = 3;

const CAMERA_WATTS: u32 = 5;

/// Instantaneous draw in watts of a device in `state` at `now`.
pub fn power_watts(state: &DeviceState, rating_watts: i64, now: DateTime<Utc>) -> u32 {
    match state {
        DeviceState::Light(light) => {
            if !light.on {
                return 0;
            }
            scale(light.base_watts(), light.brightness())
        }
        DeviceState::Ac(ac) => {
            if !ac.on {
                return 0;
            }
            let mut watts = AC_BASE_WATTS;
            if ac.setpoint_celsius < AC_COOL_SETPOINT_BELOW {
                watts += AC_COOL_EXTRA_WATTS;
            }
            if is_ac_daytime(now) {
                watts += AC_DAYTIME_EXTRA_WATTS;
            }
            watts.min(AC_MAX_WATTS)
        }
        DeviceState::Tv(tv) => {
            if !tv.on {
                return 0;
            }
            scale(tv.base_watts(), tv.brightness()).max(TV_MIN_WATTS)
        }
        DeviceState::Pc(pc) => {
            if !pc.on {
                return PC_STANDBY_WATTS;
            }
            let load = f64::from(pc.load_percent()) / 100.0;
            (PC_IDLE_WATTS + (PC_MAX_WATTS - PC_IDLE_WATTS) * load).round() as u32
        }
        DeviceState::Speaker(speaker) => {
            if !speaker.on {
                return 0;
            }
            (SPEAKER_BASE_WATTS + SPEAKER_WATTS_PER_VOLUME * f64::from(speaker.volume())).round()
                as u32
        }
        DeviceState::Fridge(fridge) => {
            if !fridge.on {
                return 0;
            }
            let mut watts = if is_compressor_running(now) {
                FRIDGE_COMPRESSOR_WATTS
            } else {
                FRIDGE_IDLE_WATTS
            };
            if fridge.door_open {
                watts += FRIDGE_DOOR_OPEN_EXTRA_WATTS;
            }
            if fridge.eco {
                watts = (f64::from(watts) * FRIDGE_ECO_FACTOR).round() as u32;
            }
            watts
        }
        DeviceState::Washer(washer) => {
            if !washer.on {
                return 0;
            }
            match washer.phase {
                WasherPhase::Spin => 800,
                WasherPhase::Wash => 500,
                WasherPhase::Heat => 1200,
                WasherPhase::Idle | WasherPhase::Paused => 10,
            }
        }
        DeviceState::Camera(camera) => {
            if camera.on {
                CAMERA_WATTS
            } else {
                0
            }
        }
        DeviceState::Plug(switch) | DeviceState::Sensor(switch) | DeviceState::Other(switch) => {
            if !switch.on {
                return 0;
            }
            rating_watts.clamp(0, i64::from(u32::MAX)) as u32
        }
    }
}

/// The next instant strictly after `after` at which the clock-dependent part
/// of the model may change value.
///
/// `None` means the draw of `state` does not depend on the time of day.
pub fn next_power_change(state: &DeviceState, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match state {
        DeviceState::Ac(ac) if ac.on => {
            let day_start = floor_to(after, 86_400)?;
            let hour = after.hour();
            let next = if hour < AC_DAYTIME_START_HOUR {
                day_start + TimeDelta::hours(i64::from(AC_DAYTIME_START_HOUR))
            } else if hour < AC_DAYTIME_END_HOUR {
                day_start + TimeDelta::hours(i64::from(AC_DAYTIME_END_HOUR))
            } else {
                day_start + TimeDelta::hours(24 + i64::from(AC_DAYTIME_START_HOUR))
            };
            Some(next)
        }
        DeviceState::Fridge(fridge) if fridge.on => {
            let minute_start = floor_to(after, 60)?;
            let in_cycle = after.minute() % FRIDGE_CYCLE_MINUTES;
            let minutes_ahead = if in_cycle < FRIDGE_COMPRESSOR_MINUTES {
                FRIDGE_COMPRESSOR_MINUTES - in_cycle
            } else {
                FRIDGE_CYCLE_MINUTES - in_cycle
            };
            Some(minute_start + TimeDelta::minutes(i64::from(minutes_ahead)))
        }
        _ => None,
    }
}

fn scale(base_watts: u32, percent: u8) -> u32 {
    (f64::from(base_watts) * f64::from(percent) / 100.0).round() as u32
}

fn is_ac_daytime(now: DateTime<Utc>) -> bool {
    (AC_DAYTIME_START_HOUR..AC_DAYTIME_END_HOUR).contains(&now.hour())
}

fn is_compressor_running(now: DateTime<Utc>) -> bool {
    now.minute() % FRIDGE_CYCLE_MINUTES < FRIDGE_COMPRESSOR_MINUTES
}

/// Truncate `t` to a multiple of `seconds` since the epoch.
fn floor_to(t: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    let ts = t.timestamp();
    DateTime::from_timestamp(ts - ts.rem_euclid(seconds), 0)
}
