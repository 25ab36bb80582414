//! Data models for the energy ledger.
//!
//! # Device state
//!
//! Every device type carries its own typed state. The variants are built
//! through constructors that clamp numeric attributes into range, so the
//! power model never has to re-validate what it reads:
//!
//! - brightness, load and volume are percentages (`0..=100`, TV `10..=100`)
//! - base ratings are non-negative watts
//! - every variant has an `on` flag
//!
//! Stored state arrives as a loosely shaped JSON blob. [`DeviceState::from_blob`]
//! reads it leniently: missing keys, wrong JSON types and unparseable blobs
//! all fall back to the type's defaults instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::cost::HomePricing;

/// The closed set of device types the power model knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Light,
    Ac,
    Plug,
    Sensor,
    Tv,
    Pc,
    Speaker,
    Fridge,
    Washer,
    Camera,
    /// Anything not recognized. Drawn as a flat on/off rating.
    #[serde(other)]
    Other,
}

impl DeviceKind {
    /// Parse a stored type tag. Unknown tags map to [`DeviceKind::Other`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => DeviceKind::Light,
            "ac" => DeviceKind::Ac,
            "plug" => DeviceKind::Plug,
            "sensor" => DeviceKind::Sensor,
            "tv" => DeviceKind::Tv,
            "pc" => DeviceKind::Pc,
            "speaker" => DeviceKind::Speaker,
            "fridge" => DeviceKind::Fridge,
            "washer" => DeviceKind::Washer,
            "camera" => DeviceKind::Camera,
            _ => DeviceKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Light => "light",
            DeviceKind::Ac => "ac",
            DeviceKind::Plug => "plug",
            DeviceKind::Sensor => "sensor",
            DeviceKind::Tv => "tv",
            DeviceKind::Pc => "pc",
            DeviceKind::Speaker => "speaker",
            DeviceKind::Fridge => "fridge",
            DeviceKind::Washer => "washer",
            DeviceKind::Camera => "camera",
            DeviceKind::Other => "other",
        }
    }

    /// Nominal rating assigned at registration.
    ///
    /// Plugs get a rating in `10..=1500` W derived from the device name, so
    /// re-registering the same plug yields the same figure.
    pub fn registration_rating_watts(&self, name: &str) -> i64 {
        match self {
            DeviceKind::Light => 9,
            DeviceKind::Ac => 900,
            DeviceKind::Plug => {
                let hash = name.trim().bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
                });
                10 + (hash % 1491) as i64
            }
            DeviceKind::Tv => 120,
            DeviceKind::Pc => 200,
            DeviceKind::Speaker => 20,
            DeviceKind::Fridge => 150,
            DeviceKind::Washer => 500,
            DeviceKind::Camera => 5,
            DeviceKind::Sensor | DeviceKind::Other => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub on: bool,
    brightness: u8,
    base_watts: u32,
}

impl LightState {
    pub const DEFAULT_BRIGHTNESS: i64 = 100;
    pub const DEFAULT_BASE_WATTS: i64 = 9;

    pub fn new(on: bool, brightness: i64, base_watts: i64) -> Self {
        Self {
            on,
            brightness: clamp_percent(brightness, 0),
            base_watts: clamp_watts(base_watts),
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn base_watts(&self) -> u32 {
        self.base_watts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcState {
    pub on: bool,
    pub setpoint_celsius: i64,
}

impl AcState {
    pub const DEFAULT_SETPOINT: i64 = 24;

    pub fn new(on: bool, setpoint_celsius: i64) -> Self {
        Self {
            on,
            setpoint_celsius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvState {
    pub on: bool,
    brightness: u8,
    base_watts: u32,
}

impl TvState {
    pub const DEFAULT_BRIGHTNESS: i64 = 70;
    pub const DEFAULT_BASE_WATTS: i64 = 100;

    /// Brightness is clamped to `10..=100`: a lit panel never draws less
    /// than a tenth of its base.
    pub fn new(on: bool, brightness: i64, base_watts: i64) -> Self {
        Self {
            on,
            brightness: clamp_percent(brightness, 10),
            base_watts: clamp_watts(base_watts),
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn base_watts(&self) -> u32 {
        self.base_watts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcState {
    pub on: bool,
    load_percent: u8,
}

impl PcState {
    pub const DEFAULT_LOAD: i64 = 20;

    pub fn new(on: bool, load_percent: i64) -> Self {
        Self {
            on,
            load_percent: clamp_percent(load_percent, 0),
        }
    }

    pub fn load_percent(&self) -> u8 {
        self.load_percent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerState {
    pub on: bool,
    volume: u8,
}

impl SpeakerState {
    pub const DEFAULT_VOLUME: i64 = 30;

    pub fn new(on: bool, volume: i64) -> Self {
        Self {
            on,
            volume: clamp_percent(volume, 0),
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FridgeState {
    pub on: bool,
    pub door_open: bool,
    pub eco: bool,
}

/// Washer programme phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasherPhase {
    Idle,
    Wash,
    Spin,
    Heat,
    Paused,
}

impl WasherPhase {
    /// Unrecognized phase names are treated as idle.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "wash" => WasherPhase::Wash,
            "spin" => WasherPhase::Spin,
            "heat" => WasherPhase::Heat,
            "paused" | "pause" => WasherPhase::Paused,
            _ => WasherPhase::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WasherPhase::Idle => "idle",
            WasherPhase::Wash => "wash",
            WasherPhase::Spin => "spin",
            WasherPhase::Heat => "heat",
            WasherPhase::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasherState {
    pub on: bool,
    pub phase: WasherPhase,
}

/// State of a device with nothing but a power switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    pub on: bool,
}

/// Typed device state, one variant per device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Light(LightState),
    Ac(AcState),
    Plug(SwitchState),
    Sensor(SwitchState),
    Tv(TvState),
    Pc(PcState),
    Speaker(SpeakerState),
    Fridge(FridgeState),
    Washer(WasherState),
    Camera(SwitchState),
    Other(SwitchState),
}

impl DeviceState {
    /// The state assumed when the stored blob says nothing.
    ///
    /// Fridges and cameras are on unless told otherwise.
    pub fn default_for(kind: DeviceKind) -> Self {
        Self::from_blob(kind, &Value::Null)
    }

    /// The state a freshly registered device starts in.
    pub fn registration_default(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Fridge => DeviceState::Fridge(FridgeState {
                on: true,
                door_open: false,
                eco: true,
            }),
            DeviceKind::Washer => DeviceState::Washer(WasherState {
                on: false,
                phase: WasherPhase::Idle,
            }),
            other => Self::default_for(other),
        }
    }

    /// Read a stored state blob. Never fails; anything unreadable takes the
    /// type's default.
    pub fn from_blob(kind: DeviceKind, blob: &Value) -> Self {
        let blob = Blob(blob.as_object());
        let on = |default| blob.bool(&["on"], default);

        match kind {
            DeviceKind::Light => DeviceState::Light(LightState::new(
                on(false),
                blob.int(&["brightness"], LightState::DEFAULT_BRIGHTNESS),
                blob.int(&["base_watts", "base_w"], LightState::DEFAULT_BASE_WATTS),
            )),
            DeviceKind::Ac => DeviceState::Ac(AcState::new(
                on(false),
                blob.int(&["setpoint_celsius", "setpoint"], AcState::DEFAULT_SETPOINT),
            )),
            DeviceKind::Plug => DeviceState::Plug(SwitchState { on: on(false) }),
            DeviceKind::Sensor => DeviceState::Sensor(SwitchState { on: on(false) }),
            DeviceKind::Tv => DeviceState::Tv(TvState::new(
                on(false),
                blob.int(&["brightness"], TvState::DEFAULT_BRIGHTNESS),
                blob.int(&["base_watts", "base_w"], TvState::DEFAULT_BASE_WATTS),
            )),
            DeviceKind::Pc => DeviceState::Pc(PcState::new(
                on(false),
                blob.int(&["load_percent", "load"], PcState::DEFAULT_LOAD),
            )),
            DeviceKind::Speaker => DeviceState::Speaker(SpeakerState::new(
                on(false),
                blob.int(&["volume"], SpeakerState::DEFAULT_VOLUME),
            )),
            DeviceKind::Fridge => DeviceState::Fridge(FridgeState {
                on: on(true),
                door_open: blob.bool(&["door_open"], false),
                eco: blob.bool(&["eco"], false),
            }),
            DeviceKind::Washer => DeviceState::Washer(WasherState {
                on: on(false),
                phase: blob
                    .text(&["phase"])
                    .map_or(WasherPhase::Wash, WasherPhase::parse),
            }),
            DeviceKind::Camera => DeviceState::Camera(SwitchState { on: on(true) }),
            DeviceKind::Other => DeviceState::Other(SwitchState { on: on(false) }),
        }
    }

    /// Parse a stored JSON string; unparseable text is the default state.
    pub fn from_json_str(kind: DeviceKind, raw: Option<&str>) -> Self {
        let value = raw
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
            .unwrap_or(Value::Null);
        Self::from_blob(kind, &value)
    }

    /// Encode the state with canonical key names.
    pub fn to_blob(&self) -> Value {
        match self {
            DeviceState::Light(s) => json!({
                "on": s.on,
                "brightness": s.brightness,
                "base_watts": s.base_watts,
            }),
            DeviceState::Ac(s) => json!({ "on": s.on, "setpoint_celsius": s.setpoint_celsius }),
            DeviceState::Tv(s) => json!({
                "on": s.on,
                "brightness": s.brightness,
                "base_watts": s.base_watts,
            }),
            DeviceState::Pc(s) => json!({ "on": s.on, "load_percent": s.load_percent }),
            DeviceState::Speaker(s) => json!({ "on": s.on, "volume": s.volume }),
            DeviceState::Fridge(s) => json!({
                "on": s.on,
                "door_open": s.door_open,
                "eco": s.eco,
            }),
            DeviceState::Washer(s) => json!({ "on": s.on, "phase": s.phase.as_str() }),
            DeviceState::Plug(s)
            | DeviceState::Sensor(s)
            | DeviceState::Camera(s)
            | DeviceState::Other(s) => json!({ "on": s.on }),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceState::Light(_) => DeviceKind::Light,
            DeviceState::Ac(_) => DeviceKind::Ac,
            DeviceState::Plug(_) => DeviceKind::Plug,
            DeviceState::Sensor(_) => DeviceKind::Sensor,
            DeviceState::Tv(_) => DeviceKind::Tv,
            DeviceState::Pc(_) => DeviceKind::Pc,
            DeviceState::Speaker(_) => DeviceKind::Speaker,
            DeviceState::Fridge(_) => DeviceKind::Fridge,
            DeviceState::Washer(_) => DeviceKind::Washer,
            DeviceState::Camera(_) => DeviceKind::Camera,
            DeviceState::Other(_) => DeviceKind::Other,
        }
    }

    pub fn is_on(&self) -> bool {
        match self {
            DeviceState::Light(s) => s.on,
            DeviceState::Ac(s) => s.on,
            DeviceState::Tv(s) => s.on,
            DeviceState::Pc(s) => s.on,
            DeviceState::Speaker(s) => s.on,
            DeviceState::Fridge(s) => s.on,
            DeviceState::Washer(s) => s.on,
            DeviceState::Plug(s)
            | DeviceState::Sensor(s)
            | DeviceState::Camera(s)
            | DeviceState::Other(s) => s.on,
        }
    }

    /// The same state with the power switch set to `on`.
    pub fn with_on(mut self, on: bool) -> Self {
        match &mut self {
            DeviceState::Light(s) => s.on = on,
            DeviceState::Ac(s) => s.on = on,
            DeviceState::Tv(s) => s.on = on,
            DeviceState::Pc(s) => s.on = on,
            DeviceState::Speaker(s) => s.on = on,
            DeviceState::Fridge(s) => s.on = on,
            DeviceState::Washer(s) => s.on = on,
            DeviceState::Plug(s)
            | DeviceState::Sensor(s)
            | DeviceState::Camera(s)
            | DeviceState::Other(s) => s.on = on,
        }
        self
    }
}

fn clamp_percent(value: i64, min: i64) -> u8 {
    value.clamp(min, 100) as u8
}

fn clamp_watts(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// Lenient accessor over a state blob's top-level object.
struct Blob<'a>(Option<&'a Map<String, Value>>);

impl<'a> Blob<'a> {
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        let map = self.0?;
        keys.iter().find_map(|key| map.get(*key))
    }

    fn bool(&self, keys: &[&str], default: bool) -> bool {
        match self.get(keys) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(default, |v| v != 0.0),
            _ => default,
        }
    }

    fn int(&self, keys: &[&str], default: i64) -> i64 {
        match self.get(keys) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|v| v as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    fn text(&self, keys: &[&str]) -> Option<&'a str> {
        self.get(keys).and_then(Value::as_str)
    }
}

/// A registered device as supplied by the device registry.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub room_id: i64,
    pub room_name: String,
    pub state: DeviceState,
    /// Nominal rating in watts. The literal draw of plugs, sensors and
    /// unknown types.
    pub rating_watts: i64,
    /// When the device was last toggled or edited, if ever recorded.
    pub last_active: Option<DateTime<Utc>>,
}

impl Device {
    pub fn kind(&self) -> DeviceKind {
        self.state.kind()
    }
}

/// An on/off transition in a device's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: i64,
    pub from: bool,
    pub to: bool,
    pub at: DateTime<Utc>,
}

/// A home and its pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Home {
    pub id: i64,
    pub name: String,
    /// ISO 3166-1 alpha-2 code, if the home has one.
    pub country: Option<String>,
    pub pricing: HomePricing,
}

/// A consistent snapshot of one household's devices and their events.
#[derive(Debug, Clone, Default)]
pub struct Household {
    pub devices: Vec<Device>,
    pub events: Vec<DeviceEvent>,
}

/// Headline figures for a household.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub total_devices: usize,
    pub on_count: usize,
    pub current_load_watts: u64,
    pub kwh_today: f64,
}

/// One entry of the longest-running ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongestRunning {
    pub device_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub room_id: i64,
    pub room: String,
    pub duration_seconds: i64,
    /// `HH:MM:SS`, or `MM:SS` under an hour.
    pub duration_label: String,
    pub last_active: Option<DateTime<Utc>>,
}

/// Everything the dashboard renders for a household.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub timestamp: DateTime<Utc>,
    pub summary: LoadSummary,
    /// Watts per hour of the current day, hour 0 first.
    pub hourly_series: [u64; 24],
    pub longest_running: Vec<LongestRunning>,
}

/// Energy and cost figures for one home.
///
/// Month-to-date and year-to-date costs are extrapolated from today's cost,
/// not accumulated.
#[derive(Debug, Clone, Serialize)]
pub struct EnergyReport {
    pub home_id: i64,
    pub home_name: String,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    pub price_cents_per_kwh: i64,
    pub kwh_today: f64,
    pub cost_today: f64,
    pub cost_mtd: f64,
    pub cost_ytd: f64,
}
