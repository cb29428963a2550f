use clap::Parser;
use miette::Result;
use tracing::Level;

use execscope::cli::{Cli, Commands, GlobalOpts};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_logging(&global);

    match cli.command {
        Commands::Query(args) => execscope::cli::commands::query::run(args, &global),
        Commands::Events(args) => execscope::cli::commands::events::run(args, &global),
        Commands::Stuck(args) => execscope::cli::commands::stuck::run(args, &global),
        Commands::Request(args) => execscope::cli::commands::request::run(args, &global),
        Commands::Profile(cmd) => execscope::cli::commands::profile::run(cmd, &global),
        Commands::Store(cmd) => execscope::cli::commands::store::run(cmd, &global),
        Commands::Config(cmd) => execscope::cli::commands::config::run(cmd, &global),
        Commands::Completions(args) => execscope::cli::commands::completions::run(args),
    }
}

/// Diagnostics go to stderr so stdout stays clean for piping
fn init_logging(global: &GlobalOpts) {
    let level = if global.verbose {
        Level::DEBUG
    } else if global.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}
