//! `watch [UPS...]`: run the polling loops and print every snapshot change.

use futures_util::StreamExt;
use futures_util::stream::select_all;

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, UpsStatus};

use super::status;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::resolve_polling(global, args.interval)?;
    cfg.devices.clone_from(&args.ups);
    let monitor = nutwatch_core::Monitor::start(&cfg).await?;

    let pollers = match status::select(&monitor, &args.ups) {
        Ok(pollers) => pollers,
        Err(e) => {
            monitor.shutdown().await;
            return Err(e);
        }
    };
    tracing::info!(
        devices = pollers.len(),
        interval_secs = cfg.poll_interval.as_secs(),
        "watching"
    );

    let mut updates = select_all(pollers.into_iter().map(|poller| {
        let poller = poller.clone();
        poller
            .stream()
            .map(move |snapshot| UpsStatus::new(&poller, snapshot))
    }));

    let color = output::should_color(global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            update = updates.next() => {
                let Some(update) = update else { break Ok(()) };
                match output::render_single(global.output, &update, |u| output::status_line(u, color)) {
                    Ok(line) => output::print_output(&line, global.quiet),
                    Err(e) => break Err(e),
                }
            }
        }
    };

    monitor.shutdown().await;
    result
}
