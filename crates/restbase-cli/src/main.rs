mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use restbase_config::loader::load_config_with_default_path;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config_with_default_path(cli.config.as_ref())?;

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    observability::init_tracing_with_level(level);

    let format = cli.format.unwrap_or_default();
    let policy = config.pagination_policy();

    match &cli.command {
        Commands::Compile(args) => {
            commands::compile::compile(args, &policy, format)?;
        }
        Commands::Query(args) => {
            commands::query::query(
                args,
                &config.postgres_config(),
                config.rls_config(),
                &policy,
                format,
            )
            .await?;
        }
        Commands::Ping => {
            commands::query::ping(&config.postgres_config()).await?;
        }
    }

    Ok(())
}
