use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "waymark", about = "Waymark analytics diagnostics", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Report provider selection and the persisted consent decision
    Check {
        /// Path to an analytics TOML file; environment variables are used
        /// when omitted
        #[arg(long)]
        config: Option<String>,
        /// Data directory holding the consent record
        #[arg(long, default_value = "/var/lib/waymark")]
        data_dir: String,
    },
    /// Send a single debug_ping event through an isolated dispatcher
    SendTest {
        /// Path to an analytics TOML file; environment variables are used
        /// when omitted
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, data_dir } => {
            commands::check::run(config.as_deref(), &data_dir)?;
        }
        Commands::SendTest { config } => {
            commands::send_test::run(config.as_deref()).await?;
        }
    }

    Ok(())
}
