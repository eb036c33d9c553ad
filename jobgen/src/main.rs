use clap::Parser;
use jobgen::cli::Cli;
use std::process::exit;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // logs go to stderr, stdout is reserved for --dry-run
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    if let Err(error) = cli.run(&mut std::io::stdout().lock()) {
        error!("{error}");
        exit(1)
    }
}
