//! CLI-side configuration: the shared config file plus flag overrides.

use std::time::Duration;

use nutwatch_config::Config;
use nutwatch_core::MonitorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config file (+ env) and apply command-line overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = nutwatch_config::load_config()?;
    apply_overrides(&mut cfg, global);
    Ok(cfg)
}

/// Build the core's `MonitorConfig` from config file + flags.
pub fn resolve(global: &GlobalOpts) -> Result<MonitorConfig, CliError> {
    let cfg = load(global)?;
    Ok(nutwatch_config::to_monitor_config(&cfg)?)
}

/// Like [`resolve`], but guarantees a non-zero polling interval,
/// falling back to `default_interval` (at least one second) when polling
/// is disabled.
pub fn resolve_polling(
    global: &GlobalOpts,
    default_interval: u64,
) -> Result<MonitorConfig, CliError> {
    let mut monitor = resolve(global)?;
    if monitor.poll_interval.is_zero() {
        monitor.poll_interval = Duration::from_secs(default_interval.max(1));
    }
    Ok(monitor)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        cfg.host.clone_from(host);
    }
    if let Some(port) = global.port {
        cfg.port = port;
    }
    if let Some(polling) = global.polling {
        cfg.polling = polling;
    }
    if let Some(threshold) = global.threshold {
        cfg.low_batt_threshold = threshold;
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["nutwatch"];
        argv.extend_from_slice(args);
        argv.push("list");
        Cli::parse_from(argv).global
    }

    #[test]
    fn flags_override_file_values() {
        let mut cfg = Config {
            host: "nas.lan".into(),
            polling: 30,
            ..Config::default()
        };
        apply_overrides(
            &mut cfg,
            &global(&["--host", "10.0.0.5", "--port", "3494", "--threshold", "20"]),
        );

        assert_eq!(cfg.host, "10.0.0.5");
        assert_eq!(cfg.port, 3494);
        assert_eq!(cfg.low_batt_threshold, 20);
        assert_eq!(cfg.polling, 30);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, &global(&[]));
        assert_eq!(cfg, Config::default());
    }
}
