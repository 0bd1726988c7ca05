mod cli;
mod report;
mod terminal;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use azca_azure::AzureClients;
use azca_core::config::load_dotenv;
use azca_core::Config;
use azca_rules::loader::{LoadStatus, RuleLoader};
use azca_rules::target::{ArmTarget, ResourceGraphTarget, TerraformTarget};
use azca_rules::{Rule, RuleOutcome, Scanner, Target};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command, OutputFormat, ScanArgs, ScanTarget};
use crate::report::ScanReport;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    load_dotenv();

    match args.command {
        Command::Scan(scan) => run_scan(scan).await,
        Command::Config => {
            init_tracing(false, false);
            let config = Config::from_env();
            let summary = serde_json::to_string_pretty(&config.redacted_summary())
                .context("failed to serialize configuration")?;
            println!("{}", summary);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_scan(scan: ScanArgs) -> Result<ExitCode> {
    init_tracing(scan.options.verbose, scan.options.debug);
    scan.target.validate().map_err(anyhow::Error::msg)?;

    let mut config = Config::from_env();
    if let Some(file) = &scan.options.file {
        config.scan.rules_path = file.clone();
    }
    if let Some(policy) = scan.options.on_error {
        config.scan.failure_policy = policy;
    }
    config.log_summary();

    let terminal = Terminal::new();
    let rules = load_rules(&config.scan.rules_path, &scan.options.rules)?;
    let target = build_target(&scan.target, &config, &terminal).await?;

    let scanner = Scanner::from_config(&config.scan);
    let outcomes = scanner.scan(&rules, &target).await;
    if outcomes.is_empty() {
        terminal.print_info(&format!("No rules apply to {} targets.", target.kind()))?;
    }

    match scan.options.output {
        OutputFormat::Text => terminal.print_outcomes(&outcomes)?,
        OutputFormat::Json => {
            let report = ScanReport::new(target.kind(), &outcomes);
            println!("{}", report.to_json().context("failed to serialize scan report")?);
        }
    }

    if outcomes.iter().any(RuleOutcome::is_failure) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// `--debug` and `--verbose` win over `RUST_LOG`. Logs go to stderr so
/// JSON output stays clean.
fn init_tracing(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_rules(path: &Path, selected: &[String]) -> Result<Vec<Rule>> {
    let mut loader = RuleLoader::new(path);
    let results = loader
        .load_all()
        .with_context(|| format!("failed to load rules from {}", path.display()))?;

    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| match &r.status {
            LoadStatus::Failed { error } => Some(format!("{}: {}", r.path.display(), error)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        bail!("invalid rule files:\n  {}", failures.join("\n  "));
    }

    if selected.is_empty() {
        return Ok(loader.into_rules());
    }
    loader.select(selected).context("failed to select rules")
}

async fn build_target(target: &ScanTarget, config: &Config, terminal: &Terminal) -> Result<Target> {
    match target {
        ScanTarget::Rg {
            subscriptions,
            groups,
        } => {
            let clients = AzureClients::from_config(&config.azure).context("failed to create Azure clients")?;
            let target = ResourceGraphTarget::new(subscriptions.clone(), clients.graph, clients.management)
                .with_groups(groups.clone());

            let missing = target
                .missing_resource_groups()
                .await
                .context("failed to list resource groups")?;
            for group in &missing {
                warn!(group = %group, "resource group not found");
                terminal.print_warning(&format!("resource group '{}' does not exist", group))?;
            }
            Ok(Target::ResourceGraph(target))
        }

        ScanTarget::Arm {
            subscription,
            group,
            template,
        } => {
            let location = subscription.as_deref().zip(group.as_deref());
            match (template, location) {
                (Some(path), location) => {
                    let template = read_template(path)?;
                    let mut target = ArmTarget::from_template(&template);
                    if let Some((subscription, group)) = location {
                        let clients = AzureClients::from_config(&config.azure)
                            .context("failed to create Azure clients")?;
                        target = target.in_group(subscription, group).with_management(clients.management);
                    }
                    info!(path = %path.display(), resources = target.resources.len(), "loaded template");
                    Ok(Target::Arm(target))
                }
                (None, Some((subscription, group))) => {
                    let clients = AzureClients::from_config(&config.azure).context("failed to create Azure clients")?;
                    let target = ArmTarget::export(clients.management, subscription, group)
                        .await
                        .with_context(|| format!("failed to export template for resource group '{}'", group))?;
                    Ok(Target::Arm(target))
                }
                (None, None) => bail!("arm scans need --subscription and --group, or --template"),
            }
        }

        ScanTarget::Tf { plan } => {
            let target = TerraformTarget::from_plan_file(plan)
                .with_context(|| format!("failed to load Terraform plan {}", plan.display()))?;
            Ok(Target::Terraform(target))
        }
    }
}

fn read_template(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in template {}", path.display()))
}
