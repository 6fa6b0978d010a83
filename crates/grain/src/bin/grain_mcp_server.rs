use color_eyre::eyre::WrapErr;
use grain::{mcp::GrainMcpServer, AnalysisParameters};
use rmcp::{transport::stdio, ServiceExt};
use tracing::{error, info};
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Parameter file (.toml or .json) whose values replace the built-in defaults
const PARAMS_ENV: &str = "GRAIN_MCP_PARAMS";

fn server_from_env() -> color_eyre::Result<GrainMcpServer> {
    let Some(path) = std::env::var_os(PARAMS_ENV) else {
        return Ok(GrainMcpServer::new());
    };
    let defaults = AnalysisParameters::from_file(&path)
        .wrap_err_with(|| format!("loading {} from {}", PARAMS_ENV, path.to_string_lossy()))?;
    defaults.validate()?;
    info!(path = %path.to_string_lossy(), "default parameters loaded");
    Ok(GrainMcpServer::with_defaults(defaults))
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let service = server_from_env()?
        .serve(stdio())
        .await
        .inspect_err(|e| error!("could not start the grain MCP server: {:?}", e))?;
    info!("grain MCP server listening on stdio");

    tokio::select! {
        quit = service.waiting() => {
            let reason = quit.inspect_err(|e| error!("grain MCP server stopped: {:?}", e))?;
            info!(?reason, "grain MCP server finished");
        }
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}
