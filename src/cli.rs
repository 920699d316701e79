//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// obsync - file sync server with cookie-session accounts
#[derive(Parser)]
#[command(name = "obsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    #[command(alias = "daemon")]
    Serve,

    /// Delete expired sessions once and exit
    SweepSessions,

    /// Load and validate the config, then exit
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["obsync"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_config_flag_and_subcommand() {
        let cli =
            Cli::try_parse_from(["obsync", "--config", "/etc/obsync.yaml", "sweep-sessions"])
                .unwrap();
        assert_eq!(cli.command, Some(Commands::SweepSessions));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/obsync.yaml")));

        let cli = Cli::try_parse_from(["obsync", "check-config", "-c", "x.yaml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["obsync", "frobnicate"]).is_err());
    }
}
