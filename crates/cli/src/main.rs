// folio CLI entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "folio", about = "Offline-tolerant document sync client")]
struct Cli {
    /// Config file (defaults to ~/.folio/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server URL, overriding the config file.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::detect(cli.json);
    let result = client::Context::load(cli.config.as_deref(), cli.server, format)
        .and_then(|ctx| commands::run(cli.command, &ctx));

    match result {
        Ok(()) => ExitCode::Success.into(),
        Err(err) => {
            output::print_anyhow_error(format, &err);
            ExitCode::from_error(&err).into()
        }
    }
}
