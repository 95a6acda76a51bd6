//! Container MCP Server entry point.
//!
//! Initializes logging, loads configuration (environment first, command line
//! flags on top) and serves the streamable HTTP transport until Ctrl-C.

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use container_mcp_server::core::{Config, McpServer, TransportService, transport::DeliveryMode};

#[derive(Parser, Debug)]
#[command(name = "container-mcp-server")]
#[command(about = "MCP server exposing tools and prompts over streamable HTTP")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Answer tool calls with a single JSON response instead of an event stream
    #[arg(long)]
    json_response: bool,

    /// Per-invocation deadline in milliseconds
    #[arg(long)]
    tool_timeout_ms: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.transport.port = port;
        }
        if let Some(host) = self.host {
            config.transport.host = host;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.json_response {
            config.transport.delivery = DeliveryMode::Buffered;
        }
        if let Some(timeout_ms) = self.tool_timeout_ms {
            config.dispatch.timeout_ms = Some(timeout_ms);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration from environment, then apply CLI overrides
    let mut config = Config::from_env();
    args.apply(&mut config);

    init_logging(&config.logging.level);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let server = McpServer::new(config.clone())?;

    info!("Server initialized");

    TransportService::new(&config).run(server).await?;

    info!("Server shutting down");

    Ok(())
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr; `RUST_LOG` directives are honoured alongside the
/// configured level.
fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
