//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use nutwatch_core::{ChargingState, DeviceInfo, DevicePoller, StatusSnapshot};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Colour the raw upsd status: red on fault, yellow on battery, green online.
pub fn paint_status(snapshot: &StatusSnapshot, color: bool) -> String {
    let text = if snapshot.fault {
        format!("{} (fault)", display_or_dash(&snapshot.status))
    } else {
        display_or_dash(&snapshot.status).to_owned()
    };

    if !color {
        return text;
    }
    if snapshot.fault {
        text.red().bold().to_string()
    } else if snapshot.on_battery {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

// ── Serializable views ───────────────────────────────────────────────

/// One UPS: identity plus its current snapshot.
#[derive(Debug, Serialize)]
pub struct UpsStatus {
    pub name: String,
    pub display_name: String,
    pub info: DeviceInfo,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

impl UpsStatus {
    pub fn new(poller: &DevicePoller, snapshot: StatusSnapshot) -> Self {
        Self {
            name: poller.name().to_owned(),
            display_name: poller.display_name().to_owned(),
            info: poller.info().clone(),
            snapshot,
        }
    }
}

#[derive(Tabled)]
pub struct StatusRow {
    #[tabled(rename = "UPS")]
    pub name: String,
    #[tabled(rename = "Name")]
    pub display_name: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Charge")]
    pub charge: String,
    #[tabled(rename = "Load")]
    pub load: String,
    #[tabled(rename = "In V")]
    pub input_voltage: String,
    #[tabled(rename = "Out V")]
    pub output_voltage: String,
    #[tabled(rename = "Batt V")]
    pub battery_voltage: String,
    #[tabled(rename = "Temp")]
    pub temperature: String,
    #[tabled(rename = "Flags")]
    pub flags: String,
}

impl StatusRow {
    pub fn new(ups: &UpsStatus, color: bool) -> Self {
        let s = &ups.snapshot;
        Self {
            name: ups.name.clone(),
            display_name: ups.display_name.clone(),
            status: paint_status(s, color),
            charge: fmt_opt(s.battery_level, "%"),
            load: s.load_percent.map_or_else(|| "-".into(), |l| format!("{l}%")),
            input_voltage: fmt_opt(s.input_voltage, "V"),
            output_voltage: fmt_opt(s.output_voltage, "V"),
            battery_voltage: fmt_opt(s.battery_voltage, "V"),
            temperature: fmt_opt(s.temperature, "°C"),
            flags: flags(s),
        }
    }
}

fn fmt_opt(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v}{unit}"))
}

/// Short comma-separated summary of the derived flags.
pub fn flags(s: &StatusSnapshot) -> String {
    let mut out = Vec::new();
    match s.charging {
        ChargingState::Charging => out.push("charging"),
        ChargingState::Discharging => out.push("discharging"),
        ChargingState::NotCharging => {}
    }
    if s.on_battery {
        out.push("on-battery");
    }
    if s.low_battery {
        out.push("low-battery");
    }
    if !s.active {
        out.push("idle");
    }
    out.join(",")
}

/// One-line summary used by `watch` and `--output plain`.
pub fn status_line(ups: &UpsStatus, color: bool) -> String {
    let s = &ups.snapshot;
    let time = s
        .updated_at
        .map_or_else(|| "--:--:--".into(), |t| t.format("%H:%M:%S").to_string());
    format!(
        "{time} {} [{}] charge={} load={} {}",
        ups.name,
        paint_status(s, color),
        fmt_opt(s.battery_level, "%"),
        s.load_percent.map_or_else(|| "-".into(), |l| format!("{l}%")),
        flags(s),
    )
    .trim_end()
    .to_owned()
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the original data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `line_fn` on each item to emit one line per item
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&line_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table and plain both use `line_fn`; structured formats go through serde.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    line_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: Serialize,
{
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(line_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    Ok(if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    })
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nutwatch_core::{PollerConfig, UpsVars};

    use super::*;

    fn ups(pairs: &[(&str, &str)]) -> UpsStatus {
        let vars: UpsVars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        UpsStatus {
            name: "ups1".into(),
            display_name: "Ups1".into(),
            info: DeviceInfo::from_vars(&vars),
            snapshot: StatusSnapshot::from_vars(&vars, PollerConfig::default().low_battery_threshold),
        }
    }

    #[test]
    fn flags_summarise_snapshot() {
        let on_battery = ups(&[("ups.status", "OB DISCHRG"), ("battery.charge", "20"), ("ups.load", "0")]);
        assert_eq!(flags(&on_battery.snapshot), "discharging,on-battery,low-battery,idle");

        let online = ups(&[("ups.status", "OL"), ("ups.load", "12")]);
        assert_eq!(flags(&online.snapshot), "");
    }

    #[test]
    fn fault_is_visible_without_color() {
        let mut status = ups(&[("ups.status", "OL")]);
        status.snapshot.fault = true;
        assert_eq!(paint_status(&status.snapshot, false), "OL (fault)");
        assert_eq!(paint_status(&StatusSnapshot::default(), false), "-");
    }

    #[test]
    fn json_flattens_snapshot() {
        let status = ups(&[("ups.status", "OL CHRG"), ("battery.charge", "90")]);
        let json = render_single(OutputFormat::JsonCompact, &status, |_| String::new()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["name"], "ups1");
        assert_eq!(value["battery_level"], 90.0);
        assert_eq!(value["charging"], "charging");
        assert_eq!(value["info"]["manufacturer"], "No Manufacturer");
    }

    #[test]
    fn plain_list_is_one_line_per_item() {
        let data = vec![ups(&[("ups.status", "OL")]), ups(&[("ups.status", "OB")])];
        let out = render_list(
            OutputFormat::Plain,
            &data,
            |u| StatusRow::new(u, false),
            |u| u.name.clone(),
        )
        .unwrap();
        assert_eq!(out, "ups1\nups1");
    }
}
