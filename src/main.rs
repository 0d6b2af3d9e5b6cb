use mailcal::auth;
use mailcal::config::{Config, TransportKind};
use mailcal::drive::DriveClient;
use mailcal::gateway;
use mailcal::google;
use mailcal::mcp::{stdio, McpServer};
use mailcal::tools::{self, Dispatcher, GatewayContext, GoogleClientFactory};

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mailcal-mcp",
    version,
    about = "Gmail and Google Calendar as MCP tools"
)]
struct Cli {
    /// Path to an optional YAML configuration file
    #[arg(short, long, env = "MAILCAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP (default; transport follows the credential mode)
    Serve {
        /// Override the transport picked from the environment
        #[arg(long, value_enum)]
        transport: Option<TransportKind>,
    },
    /// Run the OAuth consent flow and store the resulting token
    Authorize {
        /// Port for the local redirect listener
        #[arg(long, default_value_t = auth::callback::CALLBACK_PORT)]
        port: u16,
    },
    /// Print the tool catalogue as JSON
    Tools,
    /// Download a Drive file by exact name (first match wins)
    Download {
        /// File name to search for
        name: String,
        /// Destination path (defaults to the file name)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries protocol traffic in stdio mode, so logs go to stderr.
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    let cli = Cli::parse();
    let mut cfg = Config::load(cli.config.as_deref()).await?;
    let http = google::http_client()?;

    match cli.command.unwrap_or(Command::Serve { transport: None }) {
        Command::Serve { transport } => {
            if let Some(transport) = transport {
                cfg.transport = transport;
            }
            serve(cfg, http).await
        }
        Command::Authorize { port } => {
            let factory = GoogleClientFactory::new(&cfg, http.clone());
            auth::authorize(http, factory.store().clone(), port).await
        }
        Command::Tools => {
            let catalog = serde_json::to_string_pretty(tools::catalog())?;
            println!("{catalog}");
            Ok(())
        }
        Command::Download { name, dest } => {
            let factory = GoogleClientFactory::new(&cfg, http);
            let drive = DriveClient::new(factory.session().await?);
            let dest = dest.unwrap_or_else(|| PathBuf::from(&name));
            let (file, bytes) = drive
                .download_by_name(&name, &dest)
                .await
                .with_context(|| format!("failed to download {name:?}"))?;
            println!("Downloaded {} ({bytes} bytes) to {}", file.name, dest.display());
            Ok(())
        }
    }
}

async fn serve(cfg: Config, http: reqwest::Client) -> anyhow::Result<()> {
    let factory = GoogleClientFactory::new(&cfg, http);
    info!(
        credentials = %factory.store().describe(),
        transport = ?cfg.transport,
        time_zone = %cfg.time_zone,
        tools = tools::catalog().len(),
        "starting {}",
        mailcal::SERVICE_NAME
    );

    let ctx = Arc::new(GatewayContext::new(Arc::new(factory)));
    let server = McpServer::new(Dispatcher::new(ctx));

    match cfg.transport {
        TransportKind::Stdio => stdio::serve_stdio(server).await,
        TransportKind::Http => {
            let gw = gateway::start_gateway(cfg.http_addr(), server)
                .await
                .with_context(|| format!("failed to bind {}", cfg.http_addr()))?;
            info!(addr = %gw.addr, "health check at http://{}/health", gw.addr);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    Ok(())
                }
                res = gw.handle => {
                    res.context("gateway task failed")?;
                    Ok(())
                }
            }
        }
    }
}
