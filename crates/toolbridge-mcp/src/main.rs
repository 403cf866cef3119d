mod tools;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use toolbridge_core::{
    serve_stream, Dispatcher, MainThreadQueue, RegistryBuilder, ServerConfig, ServerIdentity, SocketServer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Socket,
}

#[derive(Parser, Debug)]
#[command(name = "toolbridge-mcp", version, about = "MCP tool server over stdio or a Unix socket")]
struct Args {
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Socket path for the socket transport (overrides config)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Config file (defaults to ~/.toolbridge/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-call handler timeout in milliseconds; 0 waits indefinitely
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries protocol frames in stdio mode
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path),
        None => ServerConfig::load_default(),
    }
    .context("failed to load config")?;

    let timeout = match args.timeout_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => config.handler_timeout(),
    };

    let mut builder = RegistryBuilder::with_toggles(config.tools.clone());
    tools::register_builtin(&mut builder).context("failed to register built-in tools")?;
    let registry = Arc::new(builder.build());

    let main_thread = MainThreadQueue::spawn_dedicated("toolbridge-main").context("failed to start main-thread executor")?;

    let dispatcher = Arc::new(
        Dispatcher::builder(registry)
            .main_thread(main_thread)
            .timeout(timeout)
            .identity(ServerIdentity::new("toolbridge-mcp", env!("CARGO_PKG_VERSION")).with_instructions(
                "Call tools/list to discover available tools. Tool failures are reported with isError: true.",
            ))
            .build(),
    );

    info!(
        "Starting toolbridge-mcp ({:?} transport, timeout {:?})",
        args.transport, timeout
    );

    match args.transport {
        Transport::Stdio => serve_stream(tokio::io::stdin(), tokio::io::stdout(), dispatcher).await?,
        Transport::Socket => {
            let socket_path = match args.socket {
                Some(path) => path,
                None => config.resolve_socket_path()?,
            };

            let server = Arc::new(SocketServer::new(socket_path, dispatcher));
            let listener = server.bind()?;

            let shutdown = Arc::clone(&server);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.shutdown();
                }
            });

            server.serve(listener).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["toolbridge-mcp"]);
        assert_eq!(args.transport, Transport::Stdio);
        assert!(args.timeout_ms.is_none());
    }

    #[test]
    fn test_cli_socket_flags() {
        let args = Args::parse_from([
            "toolbridge-mcp",
            "--transport",
            "socket",
            "--socket",
            "/tmp/tb.sock",
            "--timeout-ms",
            "250",
        ]);
        assert_eq!(args.transport, Transport::Socket);
        assert_eq!(args.socket, Some(PathBuf::from("/tmp/tb.sock")));
        assert_eq!(args.timeout_ms, Some(250));
    }
}
