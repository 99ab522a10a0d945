//! pterowatchd: the pterowatch daemon.
//!
//! Single binary that assembles the watcher:
//! - Configuration (`pterowatch.toml`)
//! - Panel client (status probe, power actuator, discovery)
//! - Server registry
//! - Watch scheduler + recovery state machine
//! - Optional operator REST API
//!
//! # Usage
//!
//! ```text
//! pterowatchd run --config /etc/pterowatch/pterowatch.toml
//! pterowatchd check-config --config ./pterowatch.toml
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "/etc/pterowatch/pterowatch.toml";
const DEFAULT_LOG_FILTER: &str = "info,pterowatchd=debug,pterowatch=debug";

#[derive(Parser)]
#[command(name = "pterowatchd", about = "Pterodactyl game server watchdog", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch every configured server until interrupted.
    Run {
        /// Path to the configuration file.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Log output format.
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },
    /// Validate the configuration file and print the server roster.
    CheckConfig {
        /// Path to the configuration file.
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, log_format } => {
            init_tracing(log_format);
            daemon::run(&config).await
        }
        Command::CheckConfig { config } => {
            init_tracing(LogFormat::Text);
            daemon::check_config(&config)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["pterowatchd", "run"]).unwrap();
        match cli.command {
            Command::Run { config, log_format } => {
                assert_eq!(config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(log_format == LogFormat::Text);
            }
            Command::CheckConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn run_with_json_logs() {
        let cli = Cli::try_parse_from([
            "pterowatchd",
            "run",
            "--config",
            "./watch.toml",
            "--log-format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Command::Run { config, log_format } => {
                assert_eq!(config, PathBuf::from("./watch.toml"));
                assert!(log_format == LogFormat::Json);
            }
            Command::CheckConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["pterowatchd", "run", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn check_config_subcommand() {
        let cli =
            Cli::try_parse_from(["pterowatchd", "check-config", "--config", "a.toml"]).unwrap();
        assert!(matches!(cli.command, Command::CheckConfig { config } if config == PathBuf::from("a.toml")));
    }
}
