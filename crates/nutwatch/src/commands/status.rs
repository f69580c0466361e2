//! `status [UPS...]`: one manual check per device, then a snapshot table.

use nutwatch_core::{DevicePoller, Monitor, MonitorConfig};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, StatusRow, UpsStatus};

pub async fn handle(args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = MonitorConfig {
        poll_interval: std::time::Duration::ZERO,
        devices: args.ups.clone(),
        ..config::resolve(global)?
    };
    let monitor = Monitor::start(&cfg).await?;
    let result = report(&monitor, &args.ups, global).await;
    monitor.shutdown().await;
    result
}

async fn report(monitor: &Monitor, names: &[String], global: &GlobalOpts) -> Result<(), CliError> {
    let pollers = select(monitor, names)?;

    let mut statuses = Vec::with_capacity(pollers.len());
    for poller in pollers {
        poller.check_and_refresh().await;
        statuses.push(UpsStatus::new(poller, poller.snapshot()));
    }

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &statuses,
        |s| StatusRow::new(s, color),
        |s| output::status_line(s, false),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// The requested pollers, or every poller when `names` is empty.
pub fn select<'a>(monitor: &'a Monitor, names: &[String]) -> Result<Vec<&'a DevicePoller>, CliError> {
    if names.is_empty() {
        return Ok(monitor.pollers().iter().collect());
    }
    names
        .iter()
        .map(|name| monitor.poller(name).map_err(CliError::from))
        .collect()
}
