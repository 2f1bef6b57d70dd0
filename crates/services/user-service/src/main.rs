//! User Service - credential store with a metrics endpoint.

use clap::{Parser, Subcommand};

use user_service_lib::config::UserServiceConfig;

#[derive(Parser)]
#[command(name = "user-service")]
#[command(about = "User credential store microservice")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the store and serve metrics until interrupted
    Serve {
        #[arg(long, env = "METRICS_HOST")]
        metrics_host: Option<String>,
        #[arg(long, env = "METRICS_PORT")]
        metrics_port: Option<u16>,
    },
    /// Look a user up by login
    Lookup {
        login: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    common::init_tracing(cli.verbose);

    let mut config = UserServiceConfig::from_env();
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Serve {
            metrics_host,
            metrics_port,
        } => {
            if let Some(host) = metrics_host {
                config.metrics.host = host;
            }
            if let Some(port) = metrics_port {
                config.metrics.port = port;
            }
            user_service_lib::run(config).await?;
        }
        Commands::Lookup { login } => {
            let user = user_service_lib::lookup(config, &login).await?;
            println!("{}\t{}", user.id, user.login);
        }
    }

    Ok(())
}
