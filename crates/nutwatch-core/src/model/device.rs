use std::collections::BTreeMap;

use serde::Serialize;

use crate::session::UpsVars;

/// Device name to optional human-friendly description (`desc` in ups.conf).
pub type DeviceList = BTreeMap<String, Option<String>>;

/// Static identity of a UPS, read once when its poller is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl DeviceInfo {
    pub fn from_vars(vars: &UpsVars) -> Self {
        let get = |key: &str| {
            vars.get(key)
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        Self {
            manufacturer: get("device.mfr")
                .or_else(|| get("ups.vendorid"))
                .unwrap_or("No Manufacturer")
                .to_owned(),
            model: get("device.model")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .or_else(|| get("ups.productid"))
                .unwrap_or("No Model#")
                .to_owned(),
            serial: get("ups.serial").unwrap_or("No Serial#").to_owned(),
            firmware: get("ups.firmware").unwrap_or("No Data").to_owned(),
        }
    }
}

/// Name shown to consumers: the description if there is one, else the
/// upsd device name, title-cased either way.
pub fn display_name(name: &str, description: Option<&str>) -> String {
    let source = description.filter(|d| !d.trim().is_empty()).unwrap_or(name);
    title_case(source)
}

/// `"APC back-ups"` becomes `"Apc Back Ups"`, `"serverRoom"` becomes `"Server Room"`.
pub fn title_case(input: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in input.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
