mod artifact;
mod cli;
mod config;
mod deploy;
mod device;
mod error;
mod install;
mod platform;
mod probe;
mod runner;
mod shellrc;

use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "frida_setup=debug"
    } else {
        "frida_setup=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    // nothing escapes uncaught: every run ends in a summary or a fatal
    // message plus exit status
    if let Err(e) = cli.execute().await {
        eprintln!("{} {e}", style("✗ Fatal:").red().bold());
        if let Some(hint) = e.remediation() {
            eprintln!("  {hint}");
        }
        std::process::exit(1);
    }
}
