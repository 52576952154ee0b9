mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let color = output::should_color(&cli.global.color);

    init_tracing(cli.global.verbose, cli.global.quiet, color);

    if let Err(err) = run(cli, color).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Provisioning progress from `iflux_core` shows at info by default;
/// `RUST_LOG` overrides the verbosity flags.
fn init_tracing(verbosity: u8, quiet: bool, color: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn,iflux_core=info",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(color)
        .with_target(verbosity > 1)
        .init();
}

async fn run(cli: Cli, color: bool) -> Result<(), CliError> {
    match cli.command {
        Command::Run(args) => commands::run::handle(args, &cli.global, color).await,
        Command::Validate(args) => commands::validate::handle(&args, &cli.global),
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "iflux", &mut std::io::stdout());
            Ok(())
        }
    }
}
