//! `execscope request` command - JSON request in, JSON envelope out
//!
//! Reads one request body from stdin and always prints an envelope, including
//! for configuration and parse failures. The exit status is non-zero when the
//! envelope reports `success: false`.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use miette::{IntoDiagnostic, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::{self, Read};

use crate::cli::helpers;
use crate::cli::GlobalOpts;
use crate::core::service;
use crate::core::{
    Config, ExecscopeError, QueryRequest, QueryTarget, StuckRequest, ValidationError,
};

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    /// Request kind
    #[arg(value_enum)]
    pub kind: RequestKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RequestKind {
    /// Job-execution status query
    Query,
    /// Lifecycle-event status query
    Events,
    /// Stuck pull-request lookup
    Stuck,
}

pub fn run(args: RequestArgs, global: &GlobalOpts) -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).into_diagnostic()?;

    let config = helpers::load_config(global);
    let envelope = handle(args.kind, &input, &config, Utc::now());
    println!("{}", serde_json::to_string_pretty(&envelope).into_diagnostic()?);

    if envelope["success"] != Value::Bool(true) {
        std::process::exit(1);
    }
    Ok(())
}

/// Run one request body and build its envelope
pub fn handle(kind: RequestKind, input: &str, config: &Config, now: DateTime<Utc>) -> Value {
    match kind {
        RequestKind::Query => status_query(QueryTarget::Executions, input, config),
        RequestKind::Events => status_query(QueryTarget::Events, input, config),
        RequestKind::Stuck => {
            let result = parse_body::<StuckRequest>(input)
                .and_then(|request| service::run_stuck(config, &request, now));
            service::envelope(&result)
        }
    }
}

fn status_query(target: QueryTarget, input: &str, config: &Config) -> Value {
    let result = parse_body::<QueryRequest>(input)
        .and_then(|request| service::run_query(config, target, &request));
    service::envelope(&result)
}

fn parse_body<T: DeserializeOwned>(input: &str) -> Result<T, ExecscopeError> {
    serde_json::from_str(input).map_err(|e| {
        ExecscopeError::from(ValidationError::InvalidBody {
            message: e.to_string(),
        })
    })
}
