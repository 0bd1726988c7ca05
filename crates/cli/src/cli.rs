use std::path::PathBuf;

use azca_core::FailurePolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Compliance scanner for Azure resources.
///
/// Evaluates declarative rules against live subscriptions, exported or local
/// ARM templates, and Terraform plans, and reports every violating resource.
#[derive(Parser, Debug)]
#[command(name = "azca", version, about = "Azure compliance analyzer")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run rules against a target
    Scan(ScanArgs),
    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(subcommand)]
    pub target: ScanTarget,

    #[command(flatten)]
    pub options: ScanOptions,
}

#[derive(Subcommand, Debug)]
pub enum ScanTarget {
    /// Query live resources through the resource graph
    Rg {
        /// Subscription to scan (repeatable)
        #[arg(long = "subscription", required = true, num_args = 1..)]
        subscriptions: Vec<String>,

        /// Limit the scan to these resource groups (single subscription only)
        #[arg(long = "group", num_args = 1..)]
        groups: Vec<String>,
    },

    /// Scan an ARM template, exported from a resource group or read from disk
    Arm {
        #[arg(long, requires = "group", required_unless_present = "template")]
        subscription: Option<String>,

        #[arg(long, requires = "subscription")]
        group: Option<String>,

        /// Local template file instead of a live export
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Scan a Terraform plan (`terraform show -json` output or a resource array)
    Tf {
        #[arg(long)]
        plan: PathBuf,
    },
}

impl ScanTarget {
    /// Combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ScanTarget::Rg {
                subscriptions,
                groups,
            } if subscriptions.len() > 1 && !groups.is_empty() => Err(
                "--group can only be used with a single --subscription".to_string(),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Args, Debug)]
pub struct ScanOptions {
    /// Rule file or directory (overrides AZCA_RULES_PATH)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Only run the named rule (repeatable)
    #[arg(long = "rule", global = true)]
    pub rules: Vec<String>,

    /// What to do when verifying one resource fails: fail-fast or skip
    #[arg(long = "on-error", global = true, value_parser = parse_failure_policy)]
    pub on_error: Option<FailurePolicy>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Log progress at info level
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Log every request at debug level
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_failure_policy(raw: &str) -> Result<FailurePolicy, azca_core::ConfigError> {
    raw.parse()
}
