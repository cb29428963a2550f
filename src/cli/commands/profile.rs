//! `execscope profile` command - credential profiles

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use tracing::warn;

use crate::cli::helpers::{self, effective_format};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::vault::merge_profiles;
use crate::core::{Config, Session, VaultClient};

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List profiles known to the vault and the config
    List,

    /// Resolve the active profile and show its session (secrets never shown)
    Show,
}

pub fn run(cmd: ProfileCommands, global: &GlobalOpts) -> Result<()> {
    let config = helpers::load_config(global);
    match cmd {
        ProfileCommands::List => run_list(&config, global),
        ProfileCommands::Show => run_show(&config, global),
    }
}

/// Vault profiles merged with configured ones; configured only if the vault fails
pub fn available_profiles(config: &Config, client: &VaultClient) -> Vec<String> {
    match client.list_profiles() {
        Ok(vault) => merge_profiles(&vault, config.known_profiles()),
        Err(error) => {
            warn!(%error, "could not list vault profiles, using configured profiles");
            config.known_profiles().to_vec()
        }
    }
}

fn run_list(config: &Config, global: &GlobalOpts) -> Result<()> {
    let client = VaultClient::new(config.vault_command());
    let profiles = available_profiles(config, &client);
    let active = config.profile();

    match effective_format(global, config) {
        OutputFormat::Json => {
            let body = serde_json::json!({ "profiles": profiles, "active": active });
            println!("{}", serde_json::to_string_pretty(&body).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            let body = serde_json::json!({ "profiles": profiles, "active": active });
            print!("{}", serde_yml::to_string(&body).into_diagnostic()?);
        }
        _ => {
            if profiles.is_empty() {
                if !global.quiet {
                    println!("{}", style("No profiles found.").dim());
                }
                return Ok(());
            }
            for profile in &profiles {
                if Some(profile.as_str()) == active {
                    println!("{} {}", style("*").green(), style(profile).green().bold());
                } else {
                    println!("  {}", profile);
                }
            }
        }
    }
    Ok(())
}

fn run_show(config: &Config, global: &GlobalOpts) -> Result<()> {
    let session = Session::establish(config)?;
    let summary = session.summary(config.credential_source());

    match effective_format(global, config) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?)
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&summary).into_diagnostic()?),
        _ => {
            let set = |flag: bool| {
                if flag {
                    style("set").green()
                } else {
                    style("not set").dim()
                }
            };
            println!("{}", style("Session").bold());
            println!("{}", style("─".repeat(40)).dim());
            println!("  Profile:        {}", style(&summary.profile).cyan());
            println!("  Region:         {}", summary.region);
            println!("  Source:         {}", summary.source);
            println!("  Access key:     {}", summary.access_key_id);
            println!("  Secret key:     {}", set(summary.secret_access_key_set));
            println!("  Session token:  {}", set(summary.session_token_set));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_falls_back_to_known_profiles_without_vault() {
        let config = Config {
            known_profiles: Some(vec!["dev".into(), "prod".into()]),
            ..Default::default()
        };
        let client = VaultClient::new("execscope-test-no-such-vault");
        assert_eq!(available_profiles(&config, &client), vec!["dev", "prod"]);
    }
}
