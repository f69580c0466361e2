//! `list`: enumerate the devices upsd serves.

use serde::Serialize;
use tabled::Tabled;

use nutwatch_core::{ConnectionSupervisor, NutConnector, display_name};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DeviceEntry {
    name: String,
    display_name: String,
    description: Option<String>,
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "UPS")]
    name: String,
    #[tabled(rename = "Name")]
    display_name: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let devices = ConnectionSupervisor::oneshot(NutConnector::new(&cfg), cfg.timeout, |s| async move {
        s.list_devices().await
    })
    .await?;

    let entries: Vec<DeviceEntry> = devices
        .into_iter()
        .map(|(name, description)| DeviceEntry {
            display_name: display_name(&name, description.as_deref()),
            name,
            description,
        })
        .collect();

    let out = output::render_list(
        global.output,
        &entries,
        |e| DeviceRow {
            name: e.name.clone(),
            display_name: e.display_name.clone(),
            description: e.description.clone().unwrap_or_default(),
        },
        |e| e.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
