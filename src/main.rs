mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { query, array } => {
            let patterns: Vec<&str> = query.iter().map(String::as_str).collect();
            commands::show(&cli.file, &patterns, array).await
        }
        Commands::Get { key } => commands::get(&cli.file, &key).await,
        Commands::Set { key, value } => commands::set(&cli.file, &key, &value).await,
        Commands::Reset { key } => commands::reset(&cli.file, &key).await,
        Commands::Migrate => commands::migrate(&cli.file).await,
    }
}
