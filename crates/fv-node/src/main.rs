//! Fair-value publishing node - entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fv_node::{AppConfig, Application};
use tracing::info;

/// Fair-value publishing node
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FV_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node until Ctrl-C (default)
    Run,
    /// Print ownership rejection counts per day
    Rejections {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
    /// Print the canonical owner of a market
    Owner { ticker: String },
    /// Release ownership of a market
    ClearOwner { ticker: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config)?;
    fv_telemetry::init_logging_with(&config.telemetry.log_filter)?;

    info!("Starting fv-node v{}", env!("CARGO_PKG_VERSION"));
    info!(
        store = ?config.store.kind,
        allowed_algos = ?config.coordinator.allowed_algos,
        "Configuration loaded"
    );

    let app = Application::new(config).await?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => app.run().await?,
        Command::Rejections { days } => {
            let stats = app.rejections(days).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Owner { ticker } => match app.owner(&ticker).await? {
            Some(owner) => println!("{ticker}: {owner}"),
            None => println!("{ticker}: unowned"),
        },
        Command::ClearOwner { ticker } => {
            if app.clear_owner(&ticker).await? {
                println!("{ticker}: ownership cleared");
            } else {
                println!("{ticker}: no owner set");
            }
        }
    }

    Ok(())
}
