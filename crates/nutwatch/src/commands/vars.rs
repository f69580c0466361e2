//! `vars <UPS>`: dump every variable upsd reports for one device.

use std::collections::BTreeMap;

use serde::Serialize;
use tabled::Tabled;

use nutwatch_core::{ConnectionSupervisor, NutConnector};

use crate::cli::{GlobalOpts, VarsArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize, Tabled)]
struct VarEntry {
    #[tabled(rename = "Variable")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub async fn handle(args: VarsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::resolve(global)?;
    let ups = args.ups;
    let vars = ConnectionSupervisor::oneshot(NutConnector::new(&cfg), cfg.timeout, move |s| async move {
        s.fetch_vars(&ups).await
    })
    .await?;

    let sorted: BTreeMap<_, _> = vars.into_iter().collect();
    let entries: Vec<VarEntry> = sorted
        .into_iter()
        .map(|(name, value)| VarEntry { name, value })
        .collect();

    let out = output::render_list(
        global.output,
        &entries,
        |e| VarEntry {
            name: e.name.clone(),
            value: e.value.clone(),
        },
        |e| format!("{}: {}", e.name, e.value),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
