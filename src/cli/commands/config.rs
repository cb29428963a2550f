//! `execscope config` command - Configuration inspection

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{self, effective_format};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::LOCAL_CONFIG_FILE;
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration values
    Show(ShowArgs),

    /// Show paths to configuration files
    Path(PathArgs),

    /// List all available configuration keys
    Keys,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show only this key's value
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Show only the local config path
    #[arg(long = "local-only")]
    pub local_only: bool,

    /// Show only the global config path
    #[arg(long = "global-only")]
    pub global_only: bool,
}

/// Valid configuration keys
const VALID_KEYS: &[(&str, &str)] = &[
    ("profile", "Active credential profile"),
    ("store", "Snapshot store directory"),
    ("region", "Region when the credentials name none (default us-east-1)"),
    ("vault_command", "Vault executable (default aws-vault)"),
    ("credential_source", "Where credentials come from: vault or env"),
    ("known_profiles", "Profiles offered when the vault cannot list them"),
    ("default_limit", "Result limit when a request gives none (default 50)"),
    ("min_page_size", "Lower bound on the page size per store read (default 1000)"),
    (
        "default_format",
        "Default output format (auto, json, csv, tsv, md, yaml)",
    ),
];

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args, global),
        ConfigCommands::Path(args) => run_path(args),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = helpers::load_config(global);

    if let Some(key) = &args.key {
        if !VALID_KEYS.iter().any(|(k, _)| *k == key.as_str()) {
            return Err(miette::miette!(
                "Unknown key '{}' (see `execscope config keys`)",
                key
            ));
        }
        return match get_config_value(&config, key) {
            Some(v) => {
                println!("{}", v);
                Ok(())
            }
            None => Err(miette::miette!("Key '{}' is not set", key)),
        };
    }

    match effective_format(global, &config) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config).into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&config).into_diagnostic()?);
            return Ok(());
        }
        _ => {}
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();
    for (key, _) in VALID_KEYS {
        print_config_value(key, get_config_value(&config, key).as_deref());
    }

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Command-line flags (--profile, --store)");
    println!("  2. Environment variables (EXECSCOPE_PROFILE, EXECSCOPE_STORE, EXECSCOPE_REGION, EXECSCOPE_VAULT, EXECSCOPE_CREDENTIALS)");
    println!("  3. Local config (./{})", LOCAL_CONFIG_FILE);
    println!("  4. Global config (~/.config/execscope/config.yaml)");

    Ok(())
}

fn run_path(args: PathArgs) -> Result<()> {
    if args.local_only && args.global_only {
        return Err(miette::miette!(
            "Cannot specify both --local-only and --global-only"
        ));
    }

    let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
    if args.local_only {
        println!("{}", local_path.display());
        return Ok(());
    }

    let global_path = Config::global_config_path()
        .ok_or_else(|| miette::miette!("Could not determine global config directory"))?;
    if args.global_only {
        println!("{}", global_path.display());
        return Ok(());
    }

    println!("{}", style("Configuration file paths:").bold());
    println!();
    println!("  {} {}", style("Global:").cyan(), global_path.display());
    print_exists(global_path.exists(), 9);
    println!();
    println!("  {} {}", style("Local:").cyan(), local_path.display());
    print_exists(local_path.exists(), 8);

    Ok(())
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();

    for (key, description) in VALID_KEYS {
        println!("  {:<20} {}", style(key).cyan(), style(description).dim());
    }

    println!();
    println!(
        "{}",
        style(format!("Set keys in {} or the global config file.", LOCAL_CONFIG_FILE)).dim()
    );

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "profile" => config.profile.clone(),
        "store" => config.store.as_ref().map(|p| p.display().to_string()),
        "region" => config.region.clone(),
        "vault_command" => config.vault_command.clone(),
        "credential_source" => config.credential_source.map(|s| s.to_string()),
        "known_profiles" => config.known_profiles.as_ref().map(|p| p.join(", ")),
        "default_limit" => config.default_limit.map(|l| l.to_string()),
        "min_page_size" => config.min_page_size.map(|s| s.to_string()),
        "default_format" => config.default_format.clone(),
        _ => None,
    }
}

fn print_config_value(key: &str, value: Option<&str>) {
    if let Some(v) = value {
        println!("  {}: {}", style(key).cyan(), style(v).yellow());
    } else {
        println!("  {}: {}", style(key).cyan(), style("(not set)").dim());
    }
}

fn print_exists(exists: bool, indent: usize) {
    let label = if exists {
        style("(exists)").green()
    } else {
        style("(not created)").dim()
    };
    println!("{}{}", " ".repeat(indent), label);
}
