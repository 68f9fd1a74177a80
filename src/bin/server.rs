//! SharePoint MCP Server
//!
//! Run with: sharepoint-mcp-server

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sharepoint_mcp::config::Config;
use sharepoint_mcp::gateway::{Gateway, MemoryGateway, DEFAULT_AUTHORITY, DEFAULT_GRAPH_BASE};
use sharepoint_mcp::mcp::{McpServer, SharePointHandler};
use sharepoint_mcp::SharePointContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Microsoft Graph
    Graph,
    /// In-process store, starts with an empty default drive
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "sharepoint-mcp-server")]
#[command(about = "SharePoint MCP server over stdio")]
struct Args {
    /// Directory tenant id
    #[arg(long, env = "TENANT_ID", default_value = "")]
    tenant_id: String,

    /// Application (client) id
    #[arg(long, env = "CLIENT_ID", default_value = "")]
    client_id: String,

    /// Application client secret
    #[arg(long, env = "CLIENT_SECRET", default_value = "", hide_env_values = true)]
    client_secret: String,

    /// Default site id
    #[arg(long, env = "SITE_ID", default_value = "")]
    site_id: String,

    /// Default drive (document library) id
    #[arg(long, env = "DRIVE_ID", default_value = "")]
    drive_id: String,

    /// Remote backend
    #[arg(long, env = "SHAREPOINT_BACKEND", value_enum, default_value = "graph")]
    backend: Backend,

    /// Graph API base URL
    #[arg(long, env = "GRAPH_BASE_URL", default_value = DEFAULT_GRAPH_BASE)]
    graph_base_url: String,

    /// Token authority
    #[arg(long, env = "GRAPH_AUTHORITY", default_value = DEFAULT_AUTHORITY)]
    graph_authority: String,

    /// HTTP timeout in seconds for Graph calls
    #[arg(long, env = "GRAPH_TIMEOUT_SECS", default_value = "30")]
    graph_timeout_secs: u64,

    /// Log output format (logs go to stderr)
    #[arg(long, env = "SHAREPOINT_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            tenant_id: self.tenant_id.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            site_id: self.site_id.clone(),
            drive_id: self.drive_id.clone(),
        }
    }
}

fn init_tracing(format: LogFormat) {
    // stdout is for MCP protocol
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[cfg(feature = "graph")]
fn graph_gateway(args: &Args, config: &Config) -> anyhow::Result<Arc<dyn Gateway>> {
    use sharepoint_mcp::gateway::{GraphConfig, GraphGateway};

    let graph_config = GraphConfig {
        base_url: args.graph_base_url.trim_end_matches('/').to_string(),
        authority: args.graph_authority.trim_end_matches('/').to_string(),
        timeout: std::time::Duration::from_secs(args.graph_timeout_secs),
    };
    let gateway = GraphGateway::new(config.tenant_context()?, graph_config)?;
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "graph"))]
fn graph_gateway(_args: &Args, _config: &Config) -> anyhow::Result<Arc<dyn Gateway>> {
    anyhow::bail!("built without the `graph` feature; use --backend memory")
}

fn build_gateway(args: &Args, config: &Config, context: &SharePointContext) -> anyhow::Result<Arc<dyn Gateway>> {
    match args.backend {
        Backend::Graph => graph_gateway(args, config),
        Backend::Memory => {
            let gateway = MemoryGateway::new();
            gateway.add_drive(context.default_drive().drive_id().as_str());
            Ok(Arc::new(gateway))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables win
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.config();
    let context = config
        .context()
        .context("invalid SharePoint configuration")?;

    let gateway = build_gateway(&args, &config, &context)?;
    let handler = SharePointHandler::for_gateway(&context, gateway)?;
    let server = McpServer::new(handler);

    tracing::info!(
        backend = ?args.backend,
        site = %context.default_site().site_id(),
        drive = %context.default_drive().drive_id(),
        "SharePoint MCP server starting..."
    );
    server.run().await?;

    Ok(())
}
