use anyhow::{Context, Result};
use clap::Parser;
use docuexplore::{
    api, config,
    gemini::GeminiService,
    logging,
    metrics::SessionMetrics,
    search::TavilyClient,
    session::{SessionRegistry, SessionServices, SessionSettings},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const EVICTION_PERIOD: Duration = Duration::from_secs(60);

/// Chat with a PDF and explore related articles.
#[derive(Debug, Parser)]
#[command(name = "docuexplore", version, about)]
struct Args {
    /// Port to listen on; overrides `SERVER_PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing(config);
    tracing::debug!(
        gemini_base_url = %config.gemini_base_url,
        gemini_model = %config.gemini_model,
        tavily_base_url = %config.tavily_base_url,
        poll_interval_secs = config.file_poll_interval_secs,
        poll_max_attempts = config.file_poll_max_attempts,
        server_port = ?config.server_port,
        session_idle_ttl_secs = config.session_idle_ttl_secs,
        "Loaded configuration"
    );

    let gemini = Arc::new(
        GeminiService::from_config(config).context("failed to build Gemini client")?,
    );
    let search = Arc::new(
        TavilyClient::from_config(config).context("failed to build Tavily client")?,
    );
    let services = Arc::new(SessionServices {
        documents: gemini.clone(),
        model: gemini,
        search,
        metrics: Arc::new(SessionMetrics::new()),
        settings: SessionSettings::from_config(config),
    });
    let registry =
        Arc::new(SessionRegistry::new(services).with_idle_ttl(config.session_idle_ttl()));
    Arc::clone(&registry).spawn_eviction(EVICTION_PERIOD);
    let app = api::create_router(registry);

    let (listener, port) = bind_listener(args.port.or(config.server_port))
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
