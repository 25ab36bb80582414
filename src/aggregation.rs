//! Household-level aggregation of device power and energy.
//!
//! Every function here takes a snapshot of devices (and events) plus an
//! explicit `now`, and never fails: a device with a malformed state already
//! carries its type's defaults, and a device with no activity record
//! contributes nothing to time-based figures.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::cost::project;
use crate::integrator::{Window, energy_wh, midnight};
use crate::model::{
    DashboardResponse, Device, DeviceKind, EnergyReport, Home, Household, LoadSummary,
    LongestRunning,
};
use crate::power::power_watts;

/// Number of entries kept in the longest-running ranking.
pub const LONGEST_RUNNING_LIMIT: usize = 5;

/// Sum of every device's instantaneous draw at `now`.
///
/// Off devices still count where the model gives them a standby draw.
pub fn current_load_watts(devices: &[Device], now: DateTime<Utc>) -> u64 {
    devices
        .iter()
        .map(|d| u64::from(power_watts(&d.state, d.rating_watts, now)))
        .sum()
}

pub fn on_count(devices: &[Device]) -> usize {
    devices.iter().filter(|d| d.state.is_on()).count()
}

/// Energy drawn since UTC midnight, in kWh.
///
/// Devices without a last-activity timestamp are left out.
pub fn energy_today_kwh(household: &Household, now: DateTime<Utc>) -> f64 {
    let window = Window::today(now);
    let wh: f64 = household
        .devices
        .iter()
        .filter(|d| {
            if d.last_active.is_none() {
                debug!(device_id = d.id, "No activity record; excluded from energy today");
            }
            d.last_active.is_some()
        })
        .map(|d| energy_wh(d, &household.events, window))
        .sum();
    wh / 1000.0
}

/// Headline figures: device counts, current load and energy today.
pub fn summarize(household: &Household, now: DateTime<Utc>) -> LoadSummary {
    LoadSummary {
        total_devices: household.devices.len(),
        on_count: on_count(&household.devices),
        current_load_watts: current_load_watts(&household.devices, now),
        kwh_today: energy_today_kwh(household, now),
    }
}

/// Approximate load per hour of the current day.
///
/// Each elapsed or current hour gets the summed draw of devices that are on
/// now and were active by the end of that hour, sampled at half past the
/// hour (or at `now` for the current hour). Hours that have not started are
/// zero. This is a coarse picture for charting, not an integration.
pub fn hourly_series(devices: &[Device], now: DateTime<Utc>) -> [u64; 24] {
    let day_start = midnight(now);
    let mut series = [0u64; 24];

    for (hour, bucket) in series.iter_mut().enumerate() {
        let bucket_start = day_start + TimeDelta::hours(hour as i64);
        if bucket_start > now {
            continue;
        }
        let bucket_end = bucket_start + TimeDelta::hours(1);
        let sample_at = (bucket_start + TimeDelta::minutes(30)).min(now);

        *bucket = devices
            .iter()
            .filter(|d| d.state.is_on())
            .filter(|d| d.last_active.unwrap_or(now) <= bucket_end)
            .map(|d| u64::from(power_watts(&d.state, d.rating_watts, sample_at)))
            .sum();
    }

    series
}

/// The devices that have been on the longest, at most
/// [`LONGEST_RUNNING_LIMIT`] of them.
///
/// Rows describing the same physical device (same trimmed, case-insensitive
/// name, type and room) collapse into one entry with the larger duration.
/// Ties keep their original order.
pub fn longest_running(devices: &[Device], now: DateTime<Utc>) -> Vec<LongestRunning> {
    let mut entries: Vec<LongestRunning> = Vec::new();
    let mut index_by_key: HashMap<(String, DeviceKind, i64), usize> = HashMap::new();

    for device in devices.iter().filter(|d| d.state.is_on()) {
        let duration_seconds = device
            .last_active
            .map_or(0, |since| (now - since).num_seconds().max(0));
        let entry = LongestRunning {
            device_id: device.id,
            name: device.name.clone(),
            kind: device.kind(),
            room_id: device.room_id,
            room: device.room_name.clone(),
            duration_seconds,
            duration_label: format_duration(duration_seconds),
            last_active: device.last_active,
        };

        let key = (
            device.name.trim().to_lowercase(),
            device.kind(),
            device.room_id,
        );
        match index_by_key.get(&key) {
            Some(&index) => {
                if entry.duration_seconds > entries[index].duration_seconds {
                    entries[index] = entry;
                }
            }
            None => {
                index_by_key.insert(key, entries.len());
                entries.push(entry);
            }
        }
    }

    entries.sort_by(|a, b| b.duration_seconds.cmp(&a.duration_seconds));
    entries.truncate(LONGEST_RUNNING_LIMIT);
    entries
}

/// Render seconds as `HH:MM:SS`, or `MM:SS` when under an hour.
///
/// Negative inputs render as zero.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Everything the dashboard shows for one household.
pub fn dashboard(household: &Household, now: DateTime<Utc>) -> DashboardResponse {
    DashboardResponse {
        timestamp: now,
        summary: summarize(household, now),
        hourly_series: hourly_series(&household.devices, now),
        longest_running: longest_running(&household.devices, now),
    }
}

/// Energy used today in `home` and what it costs.
pub fn energy_report(home: &Home, household: &Household, now: DateTime<Utc>) -> EnergyReport {
    let projection = project(energy_today_kwh(household, now), &home.pricing, now);
    EnergyReport {
        home_id: home.id,
        home_name: home.name.clone(),
        timestamp: now,
        currency: projection.currency,
        price_cents_per_kwh: home.pricing.price_cents_per_kwh,
        kwh_today: projection.kwh_today,
        cost_today: projection.cost_today,
        cost_mtd: projection.cost_mtd,
        cost_ytd: projection.cost_ytd,
    }
}
