//! Configuration command implementation

use std::path::Path;

use crate::cli::display::Display;
use crate::core::{Config, PostureError, PostureResult};
use clap::ArgMatches;

/// Handle the config command
pub fn handle(matches: &ArgMatches, config: &Config, display: &Display) -> PostureResult<()> {
    match matches.subcommand() {
        Some(("show", _)) => handle_show(config),
        Some(("validate", _)) => handle_validate(config, display),
        Some(("init", sub_matches)) => handle_init(sub_matches, display),
        _ => {
            display.error("No subcommand specified");
            display.info("Available subcommands: show, validate, init");
            Ok(())
        }
    }
}

fn handle_show(config: &Config) -> PostureResult<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

/// The configuration was already loaded and validated at startup, so
/// reaching this point means it is valid; report what it resolves to.
fn handle_validate(config: &Config, display: &Display) -> PostureResult<()> {
    config.validate()?;
    display.success("Configuration is valid");

    let interval = format!("{}s", config.scheduler.interval_seconds);
    let timeout = format!("{}ms", config.executor.default_timeout_ms);
    let concurrency = match config.executor.max_concurrent_probes {
        0 => "unbounded".to_string(),
        n => n.to_string(),
    };
    let disabled = if config.probes.disabled.is_empty() {
        "none".to_string()
    } else {
        config.probes.disabled.join(", ")
    };

    display.key_value_list(&[
        ("Log level", config.app.log_level.as_str()),
        ("Interval", interval.as_str()),
        ("Default timeout", timeout.as_str()),
        ("Concurrency", concurrency.as_str()),
        ("Disabled probes", disabled.as_str()),
        ("Output format", config.output.format.as_str()),
    ]);
    Ok(())
}

fn handle_init(matches: &ArgMatches, display: &Display) -> PostureResult<()> {
    let path = matches
        .get_one::<String>("path")
        .map(String::as_str)
        .unwrap_or("postureguard.yaml");
    let path = Path::new(path);

    if path.exists() && !matches.get_flag("force") {
        return Err(PostureError::config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save_to_file(path)?;
    display.success(&format!("Default configuration written to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::app::build_cli_app;

    fn config_matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["postureguard", "config"];
        argv.extend_from_slice(args);
        let matches = build_cli_app().try_get_matches_from(argv).unwrap();
        matches.subcommand_matches("config").unwrap().clone()
    }

    #[test]
    fn test_init_writes_loadable_config_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pg.yaml");
        let path_str = path.to_str().unwrap();
        let display = Display::plain();

        handle(&config_matches(&["init", path_str]), &Config::default(), &display).unwrap();
        assert_eq!(Config::load_from_file(&path).unwrap(), Config::default());

        assert!(handle(&config_matches(&["init", path_str]), &Config::default(), &display).is_err());
        assert!(handle(
            &config_matches(&["init", path_str, "--force"]),
            &Config::default(),
            &display
        )
        .is_ok());
    }
}
