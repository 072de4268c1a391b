use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tira::ImportFormat;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify every division and write import plans for new resources.
    Plan(PlanArgs),
    /// Classify every division and report drift, without planning imports.
    Classify(ClassifyArgs),
    /// List the resource types a provider has identity rules for.
    Rules(RulesArgs),
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Directory of tracked state, one subdirectory per division.
    #[arg(long, env = "TIRA_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Directory of inventory scans, one subdirectory per division.
    #[arg(long, env = "TIRA_INVENTORY_DIR")]
    pub inventory_dir: PathBuf,

    /// Directory of cloud actor logs, one `actions.json` per division.
    #[arg(long, env = "TIRA_ACTIONS_DIR")]
    pub actions_dir: Option<PathBuf>,

    #[arg(long, env = "TIRA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only reconcile these divisions.
    #[arg(long = "division")]
    pub divisions: Vec<String>,

    /// Write the machine-readable run report to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// JSON file mapping identities or `division.type.name` to workspaces.
    #[arg(long, env = "TIRA_ASSIGNMENTS")]
    pub assignments: Option<PathBuf>,

    #[arg(long)]
    pub default_workspace: Option<String>,

    #[arg(long, env = "TIRA_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Names the artifacts of this run. Defaults to a random UUID.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Overrides the format from the config file.
    #[arg(long, value_enum)]
    pub format: Option<ImportFormat>,
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

#[derive(clap::Args, Debug)]
pub struct RulesArgs {
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "TIRA_STATE_DIR",
        "TIRA_INVENTORY_DIR",
        "TIRA_ACTIONS_DIR",
        "TIRA_CONFIG",
        "TIRA_ASSIGNMENTS",
        "TIRA_OUT_DIR",
    ];

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let backup: Vec<(&str, Option<String>)> = ENV_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        unsafe {
            for name in ENV_VARS {
                std::env::remove_var(name);
            }
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
        }

        let result = f();

        unsafe {
            for (name, value) in backup {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }

        result
    }

    #[test]
    #[serial]
    fn test_plan_args_from_flags() {
        let cli = with_env(&[], || {
            Cli::parse_from([
                "tira",
                "plan",
                "--state-dir=state",
                "--inventory-dir=scan",
                "--division=acct-1",
                "--division=acct-2",
                "--run-id=run-7",
                "--format=cli",
            ])
        });

        if let Command::Plan(args) = cli.command {
            assert_eq!(args.source.state_dir, PathBuf::from("state"));
            assert_eq!(args.source.inventory_dir, PathBuf::from("scan"));
            assert_eq!(args.source.divisions, vec!["acct-1", "acct-2"]);
            assert!(args.source.actions_dir.is_none());
            assert_eq!(args.run_id.as_deref(), Some("run-7"));
            assert_eq!(args.format, Some(ImportFormat::Cli));
            assert_eq!(args.out_dir, PathBuf::from("."));
            assert!(args.assignments.is_none());
        } else {
            panic!("Expected Plan command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_source_dirs_from_env() {
        let cli = with_env(
            &[
                ("TIRA_STATE_DIR", "/var/tira/state"),
                ("TIRA_INVENTORY_DIR", "/var/tira/scan"),
                ("TIRA_OUT_DIR", "/var/tira/out"),
                ("TIRA_ACTIONS_DIR", "/var/tira/actions"),
            ],
            || Cli::parse_from(["tira", "plan"]),
        );

        if let Command::Plan(args) = cli.command {
            assert_eq!(args.source.state_dir, PathBuf::from("/var/tira/state"));
            assert_eq!(args.source.inventory_dir, PathBuf::from("/var/tira/scan"));
            assert_eq!(args.out_dir, PathBuf::from("/var/tira/out"));
            assert_eq!(args.source.actions_dir, Some(PathBuf::from("/var/tira/actions")));
        } else {
            panic!("Expected Plan command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_cli_flag_takes_precedence_over_env() {
        let cli = with_env(
            &[
                ("TIRA_STATE_DIR", "env_state"),
                ("TIRA_INVENTORY_DIR", "env_scan"),
            ],
            || Cli::parse_from(["tira", "classify", "--state-dir=cli_state"]),
        );

        if let Command::Classify(args) = cli.command {
            assert_eq!(args.source.state_dir, PathBuf::from("cli_state"));
            assert_eq!(args.source.inventory_dir, PathBuf::from("env_scan"));
        } else {
            panic!("Expected Classify command, got {:?}", cli.command);
        }
    }

    #[test]
    #[serial]
    fn test_missing_state_dir_is_rejected() {
        let result = with_env(&[], || {
            Cli::try_parse_from(["tira", "classify", "--inventory-dir=scan"])
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_rules_args() {
        let cli = Cli::parse_from(["tira", "rules", "aws"]);
        if let Command::Rules(args) = cli.command {
            assert_eq!(args.provider, "aws");
        } else {
            panic!("Expected Rules command, got {:?}", cli.command);
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = Cli::try_parse_from([
            "tira",
            "plan",
            "--state-dir=s",
            "--inventory-dir=i",
            "--format=yaml",
        ]);
        assert!(result.is_err());
    }
}
