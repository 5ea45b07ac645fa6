use clap::Parser;
use mqless::config::{Cli, Config};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    mqless::run(config).await
}
