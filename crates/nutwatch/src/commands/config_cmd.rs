//! Config subcommand handlers.

use nutwatch_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Copy of the config with the plaintext password masked.
fn redacted(cfg: &Config) -> Config {
    Config {
        password: cfg.password.as_ref().map(|_| "****".into()),
        ..cfg.clone()
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&config::load(global)?);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&cfg)?,
                format => output::render_single(format, &cfg, |_| String::new())?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &nutwatch_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Init { force } => {
            let path = nutwatch_config::config_path();
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }

            let mut cfg = Config::default();
            if let Some(ref host) = global.host {
                cfg.host.clone_from(host);
            }
            if let Some(port) = global.port {
                cfg.port = port;
            }
            let written = nutwatch_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Wrote {}", written.display());
            }
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let password = rpassword::prompt_password(format!("Password for {}: ", cfg.host))?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "cannot be empty".into(),
                });
            }
            nutwatch_config::store_password(&cfg.host, &password)?;
            if !global.quiet {
                eprintln!("Password for {} stored in system keyring", cfg.host);
            }
            Ok(())
        }
    }
}
