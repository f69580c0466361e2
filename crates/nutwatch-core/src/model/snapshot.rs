// ── Per-UPS status snapshot ──
//
// Typed view of the handful of NUT variables nutwatch cares about, plus
// the flags derived from them. Parsing is deliberately permissive: upsd
// values are free-form strings, so a leading numeric prefix is accepted
// ("230.1V" reads as 230.1) and anything else becomes `None`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::session::UpsVars;

// ── Variable names ───────────────────────────────────────────────────

pub const BATTERY_CHARGE: &str = "battery.charge";
pub const BATTERY_VOLTAGE: &str = "battery.voltage";
pub const INPUT_VOLTAGE: &str = "input.voltage";
pub const OUTPUT_VOLTAGE: &str = "output.voltage";
pub const UPS_LOAD: &str = "ups.load";
pub const UPS_STATUS: &str = "ups.status";
pub const UPS_TEMPERATURE: &str = "ups.temperature";

// ── ChargingState ────────────────────────────────────────────────────

/// Battery charging state, derived from `ups.status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChargingState {
    Charging,
    Discharging,
    #[default]
    NotCharging,
}

impl ChargingState {
    /// Only the two exact status strings map to a charging direction.
    pub fn from_status(status: &str) -> Self {
        match status {
            "OL CHRG" => Self::Charging,
            "OB DISCHRG" => Self::Discharging,
            _ => Self::NotCharging,
        }
    }
}

// ── StatusSnapshot ───────────────────────────────────────────────────

/// Most recently derived status for one UPS.
///
/// `fault` is set whenever the latest fetch failed or the session was not
/// ready; the other fields then hold the last good readings and should be
/// treated as stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub battery_level: Option<f64>,
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub load_percent: Option<i64>,
    pub temperature: Option<f64>,
    /// Raw `ups.status`, e.g. `"OL CHRG"` or `"OB DISCHRG"`.
    pub status: String,
    pub low_battery: bool,
    pub charging: ChargingState,
    /// The UPS is carrying load.
    pub active: bool,
    pub on_battery: bool,
    pub fault: bool,
    /// Time of the last successful refresh.
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Recompute every field from a fresh variable set and clear `fault`.
    pub fn apply_vars(&mut self, vars: &UpsVars, low_battery_threshold: i64, now: DateTime<Utc>) {
        let get = |key: &str| vars.get(key).map(String::as_str);

        let status = get(UPS_STATUS).unwrap_or_default();
        let charge = get(BATTERY_CHARGE);
        let load = get(UPS_LOAD).and_then(parse_int);

        self.battery_level = charge.and_then(parse_float);
        self.low_battery = is_low_battery(charge.and_then(parse_int), low_battery_threshold);
        self.input_voltage = get(INPUT_VOLTAGE).and_then(parse_float);
        self.output_voltage = get(OUTPUT_VOLTAGE).and_then(parse_float);
        self.battery_voltage = get(BATTERY_VOLTAGE).and_then(parse_float);
        self.temperature = get(UPS_TEMPERATURE).and_then(parse_float);
        self.load_percent = load;
        self.active = load.is_some_and(|l| l > 0);
        self.charging = ChargingState::from_status(status);
        self.on_battery = status.starts_with("OB");
        self.status = status.to_owned();
        self.fault = false;
        self.updated_at = Some(now);
    }

    /// Build a snapshot from a single variable set.
    pub fn from_vars(vars: &UpsVars, low_battery_threshold: i64) -> Self {
        let mut snapshot = Self::default();
        snapshot.apply_vars(vars, low_battery_threshold, Utc::now());
        snapshot
    }
}

/// An unreadable charge never counts as low.
pub fn is_low_battery(charge: Option<i64>, threshold: i64) -> bool {
    charge.is_some_and(|c| c < threshold)
}

// ── Lenient numeric parsing ──────────────────────────────────────────

/// Parse the leading decimal number of `raw`, ignoring leading whitespace
/// and any trailing garbage.
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&bytes[exp_end..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().ok()
}

/// Parse the leading base-10 integer of `raw` (`"35.9"` reads as 35).
pub fn parse_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits = count_digits(&bytes[sign..]);
    if digits == 0 {
        return None;
    }
    s[..sign + digits].parse().ok()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}
