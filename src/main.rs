use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use rss_mcp::feed::GetFeedParams;
use rss_mcp::tool::FeedTools;
use rss_mcp::transport::{serve_http, serve_stdio, McpServer};
use rss_mcp::Config;

#[derive(Parser, Debug)]
#[command(
    name = "rss-mcp",
    version,
    about = "MCP server for RSS/Atom/RDF feeds with RSSHub mirror failover"
)]
struct Args {
    /// Config file (default: ~/.config/rss-mcp/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// RSSHub instance to try before the built-in mirrors
    #[arg(long, global = true, value_name = "URL")]
    priority_instance: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MCP over stdin/stdout
    Stdio,
    /// Serve MCP over HTTP
    Http {
        /// Listen address (overrides the config file)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Fetch one feed and print it as JSON
    Fetch {
        /// Feed URL or rsshub:// path
        url: String,
        /// Number of items (0 = all)
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
}

fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Config::default_path(),
    };

    let mut config = match path {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            tracing::warn!("HOME not set, using default configuration");
            Config::default()
        }
    };

    // Precedence: CLI flag, then environment, then config file.
    config.apply_env();
    config.override_priority(args.priority_instance.clone());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the stdio protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let client = config
        .feed_client()
        .context("Failed to build HTTP client")?;

    match args.command {
        Command::Stdio => {
            let tools = FeedTools::new(client).with_defaults(config.default_count, config.concurrency);
            serve_stdio(McpServer::new(tools))
                .await
                .context("stdio transport failed")?;
        }
        Command::Http { bind } => {
            let addr = match bind {
                Some(addr) => addr,
                None => config
                    .http_bind
                    .parse()
                    .with_context(|| format!("Invalid http_bind address: {}", config.http_bind))?,
            };
            let tools = FeedTools::new(client).with_defaults(config.default_count, config.concurrency);
            serve_http(McpServer::new(tools), addr)
                .await
                .with_context(|| format!("HTTP transport failed on {addr}"))?;
        }
        Command::Fetch { url, count } => {
            let params = GetFeedParams::new(url).count(count.unwrap_or(config.default_count));
            let feed = client.get_feed(&params).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
        }
    }

    Ok(())
}
