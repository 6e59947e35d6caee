//! Command-line front end: argument parsing, logging setup and dispatch

pub mod app;
pub mod commands;
pub mod display;

use std::path::{Path, PathBuf};

use crate::core::{Config, PostureError, PostureResult};
use clap::{ArgMatches, Command};
use display::Display;

/// Configuration file picked up from the working directory when no
/// `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "postureguard.yaml";

/// Main CLI application entry point
pub struct CliApp {
    display: Display,
}

impl CliApp {
    pub fn new() -> Self {
        Self {
            display: Display::new(),
        }
    }

    /// Parse the process arguments and run the selected command
    pub async fn run(mut self) -> PostureResult<()> {
        let matches = self.build_app().get_matches();
        if matches.get_flag("no-color") {
            self.display.use_colors = false;
        }

        let config = self.load_config(&matches)?;
        self.setup_logging(&matches, &config)?;

        self.handle_command(&matches, &config).await
    }

    fn build_app(&self) -> Command {
        app::build_cli_app()
    }

    /// Load configuration from file or defaults, then apply environment
    /// overrides
    fn load_config(&self, matches: &ArgMatches) -> PostureResult<Config> {
        let path = resolve_config_path(
            matches.get_one::<String>("config").map(String::as_str),
            Path::new(DEFAULT_CONFIG_FILE),
        );
        Config::load_with_overrides(path.as_deref())
    }

    /// Set up logging based on CLI arguments and config. Logs go to stderr
    /// so that JSON on stdout stays machine-readable.
    fn setup_logging(&self, matches: &ArgMatches, config: &Config) -> PostureResult<()> {
        use tracing::Level;
        use tracing_subscriber::FmtSubscriber;

        let level = if matches.get_flag("verbose") || config.app.debug_mode {
            Level::DEBUG
        } else if matches.get_flag("quiet") {
            Level::ERROR
        } else {
            match config.app.log_level.as_str() {
                "trace" => Level::TRACE,
                "debug" => Level::DEBUG,
                "info" => Level::INFO,
                "warn" => Level::WARN,
                "error" => Level::ERROR,
                _ => Level::INFO,
            }
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(self.display.use_colors)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| PostureError::config(format!("Failed to set up logging: {}", e)))
    }

    async fn handle_command(&self, matches: &ArgMatches, config: &Config) -> PostureResult<()> {
        match matches.subcommand() {
            Some(("scan", sub_matches)) => commands::scan::handle(sub_matches, config, &self.display).await,
            Some(("watch", sub_matches)) => commands::watch::handle(sub_matches, config, &self.display).await,
            Some(("list", _)) => commands::list::handle(config, &self.display),
            Some(("config", sub_matches)) => commands::config::handle(sub_matches, config, &self.display),
            _ => Err(PostureError::config("No command given")),
        }
    }
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

/// An explicit path always wins; otherwise `fallback` is used if it exists
fn resolve_config_path(explicit: Option<&str>, fallback: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(PathBuf::from(path)),
        None if fallback.is_file() => Some(fallback.to_path_buf()),
        None => None,
    }
}
