//! CLI application builder

use clap::{value_parser, Arg, ArgAction, Command, ValueHint};

/// Build the complete CLI application
pub fn build_cli_app() -> Command {
    Command::new("postureguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Host security and privacy posture monitor")
        .long_about(
            "PostureGuard periodically runs a fixed battery of network, system and privacy\n\
            checks and reduces them to a 0-100 posture score with per-check statuses.\n\
            Checks that need tools or privileges the host lacks report a degraded status\n\
            instead of failing the scan.",
        )
        .after_help(
            "Examples:\n\
            postureguard scan                      # One cycle, text output\n\
            postureguard scan -o json -f out.json  # One cycle, JSON to a file\n\
            postureguard watch --interval 30       # Rescan every 30 seconds\n\
            postureguard list                      # Show the registered checks",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .long_help(
                    "Configuration file to load. Without it, postureguard.yaml in the current \
                    directory is used when present, otherwise built-in defaults.",
                )
                .value_hint(ValueHint::FilePath)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only log errors")
                .conflicts_with("verbose")
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .action(ArgAction::SetTrue)
                .help("Disable colored output")
                .global(true),
        )
        .subcommand(build_scan_command())
        .subcommand(build_watch_command())
        .subcommand(build_list_command())
        .subcommand(build_config_command())
        .subcommand_required(true)
        .arg_required_else_help(true)
}

fn output_args() -> [Arg; 2] {
    [
        Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FORMAT")
            .help("Output format")
            .value_parser(["json", "text"]),
        Arg::new("file")
            .short('f')
            .long("file")
            .value_name("PATH")
            .help("Write the report to a file instead of stdout")
            .value_hint(ValueHint::FilePath),
    ]
}

fn build_scan_command() -> Command {
    Command::new("scan")
        .about("Run one posture cycle and print the snapshot")
        .args(output_args())
}

fn build_watch_command() -> Command {
    Command::new("watch")
        .about("Rescan periodically until interrupted")
        .long_about(
            "Run posture cycles on a fixed interval. A tick that arrives while a cycle is\n\
            still running is skipped. Ctrl-C stops the scheduler and discards the results\n\
            of an unfinished cycle.",
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("SECONDS")
                .help("Seconds between cycles (overrides scheduler.interval_seconds)")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .args(output_args())
}

fn build_list_command() -> Command {
    Command::new("list").about("List registered checks grouped by section")
}

fn build_config_command() -> Command {
    Command::new("config")
        .about("Inspect and manage configuration")
        .subcommand_required(true)
        .subcommand(Command::new("show").about("Print the effective configuration as YAML"))
        .subcommand(Command::new("validate").about("Validate the configuration and report problems"))
        .subcommand(
            Command::new("init")
                .about("Write a default configuration file")
                .arg(
                    Arg::new("path")
                        .value_name("FILE")
                        .default_value("postureguard.yaml")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite an existing file"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli_app().debug_assert();
    }

    #[test]
    fn test_watch_interval_parsing() {
        let matches = build_cli_app()
            .try_get_matches_from(["postureguard", "watch", "-i", "30", "-o", "json"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "watch");
        assert_eq!(sub.get_one::<u64>("interval"), Some(&30));
        assert_eq!(sub.get_one::<String>("output").map(String::as_str), Some("json"));

        assert!(build_cli_app()
            .try_get_matches_from(["postureguard", "watch", "-i", "0"])
            .is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let matches = build_cli_app()
            .try_get_matches_from(["postureguard", "list", "--config", "/tmp/x.yaml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("config").map(String::as_str),
            Some("/tmp/x.yaml")
        );
    }
}
