use clap::Parser;
use relay_core::{Config, Service};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[clap(author, version, about = "an optimistic proposer-builder-separation relay", long_about = None)]
struct Cli {
    #[clap(value_name = "FILE")]
    config_file: String,
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = Config::from_toml_file(&cli.config_file)?;

    tracing::info!(network = %config.network, "starting relay");

    let service = Service::from(config)?;
    let (shutdown, running) = service.spawn().await?;

    tokio::select! {
        _ = running => {}
        _ = signal::ctrl_c() => {
            tracing::info!("shutting down...");
            let _ = shutdown.send(true);
        }
    }

    Ok(())
}
