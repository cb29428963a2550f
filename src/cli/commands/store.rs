//! `execscope store` command - snapshot store inspection

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{self, effective_format};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::catalog;
use crate::core::service;

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Show collections, item counts and index entries
    Status,
}

pub fn run(cmd: StoreCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        StoreCommands::Status => run_status(global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let config = helpers::load_config(global);
    let store = service::open_store(&config)?;
    let stats = store.statistics().into_diagnostic()?;

    match effective_format(global, &config) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats).into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&stats).into_diagnostic()?);
            return Ok(());
        }
        _ => {}
    }

    println!("{}", style("Store Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    if let Some(path) = &config.store {
        println!("  Location:     {}", path.display());
    }
    println!("  Collections:  {}", style(stats.collections.len()).cyan());
    println!("  Total items:  {}", style(stats.total_items()).cyan());

    for collection in &stats.collections {
        println!();
        println!(
            "  {} {}",
            style(&collection.name).bold(),
            style(&collection.source).dim()
        );
        println!("    Items:          {}", collection.item_count);
        println!("    Index entries:  {}", collection.index_entries);
        for index in catalog::indexes_for(&collection.name) {
            println!(
                "    {:<6} {} / {}",
                index.name, index.partition_attribute, index.sort_attribute
            );
        }
    }

    Ok(())
}
