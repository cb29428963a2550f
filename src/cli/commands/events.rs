//! `execscope events` command - lifecycle-event records by tenant and status

use miette::Result;

use crate::cli::commands::query::{run_status_query, QueryArgs};
use crate::cli::GlobalOpts;
use crate::core::QueryTarget;

#[derive(clap::Args, Debug)]
pub struct EventsArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Only events whose name contains this text
    #[arg(long, short = 'e')]
    pub event_name: Option<String>,
}

pub fn run(args: EventsArgs, global: &GlobalOpts) -> Result<()> {
    run_status_query(QueryTarget::Events, &args.query, args.event_name, global)
}
