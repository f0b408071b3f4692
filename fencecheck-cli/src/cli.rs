//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// fencecheck -- network policy conformance harness.
///
/// Use `fencecheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "fencecheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the fencecheck.toml configuration file.
    ///
    /// When omitted, `fencecheck.toml` in the working directory is used if it
    /// exists, otherwise built-in defaults (plus environment overrides).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Control plane backends selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// The cluster from the current kubeconfig or in-cluster configuration.
    Kubernetes,
    /// Built-in reference engine. Nothing leaves the process.
    Memory,
}

impl Backend {
    /// Name as written in `[cluster] backend`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Memory => "memory",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run conformance scenarios and report verdicts.
    Run(RunArgs),

    /// List available scenarios (built-in catalog plus scenario_dir).
    List,

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run conformance scenarios against a control plane.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run the named scenario. Repeat to select several.
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Override `[cluster] backend`.
    #[arg(long)]
    pub backend: Option<Backend>,
}

// ---- config ----

/// Manage fencecheck configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, cluster, scenario, workload).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::try_parse_from(["fencecheck", "run"]).expect("parse succeeded");
        match cli.command {
            Commands::Run(run_args) => {
                assert!(run_args.scenarios.is_empty(), "no scenario filter by default");
                assert!(run_args.backend.is_none(), "backend comes from config");
            }
            _ => panic!("expected Run command"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_parse_run_repeated_scenarios() {
        let cli = Cli::try_parse_from([
            "fencecheck",
            "run",
            "--scenario",
            "default-deny",
            "-s",
            "ports",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Run(run_args) => {
                assert_eq!(run_args.scenarios, vec!["default-deny", "ports"]);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_backend() {
        let cli = Cli::try_parse_from(["fencecheck", "run", "--backend", "memory"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Run(run_args) => {
                assert_eq!(run_args.backend, Some(Backend::Memory));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn test_cli_parse_run_unknown_backend_fails() {
        let args = Cli::try_parse_from(["fencecheck", "run", "--backend", "docker"]);
        assert!(args.is_err(), "unknown backend should be rejected by clap");
    }

    #[test]
    fn test_backend_names_match_config_values() {
        assert_eq!(Backend::Kubernetes.as_str(), "kubernetes");
        assert_eq!(Backend::Memory.as_str(), "memory");
        for backend in [Backend::Kubernetes, Backend::Memory] {
            assert!(fencecheck_core::config::VALID_BACKENDS.contains(&backend.as_str()));
        }
    }

    #[test]
    fn test_cli_parse_list() {
        let cli = Cli::try_parse_from(["fencecheck", "list"]).expect("parse succeeded");
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["fencecheck", "config", "validate"]).expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => {
                assert!(matches!(config_args.action, ConfigAction::Validate));
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["fencecheck", "config", "show", "--section", "scenario"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("scenario".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fencecheck",
            "run",
            "--config",
            "/custom/fencecheck.toml",
            "--log-level",
            "debug",
            "--output",
            "json",
        ])
        .expect("parse succeeded");
        assert_eq!(
            cli.config,
            Some(PathBuf::from("/custom/fencecheck.toml"))
        );
        assert_eq!(cli.log_level, Some("debug".to_owned()));
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        let args = Cli::try_parse_from(["fencecheck"]);
        assert!(args.is_err(), "should fail when no command provided");
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "fencecheck");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for expected in ["run", "list", "config"] {
            assert!(
                subcommands.contains(&expected),
                "should have '{expected}' subcommand"
            );
        }
    }
}
