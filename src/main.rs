//! confgate CLI - gated configuration deployment for managed hosts

use clap::Parser;

use confgate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
