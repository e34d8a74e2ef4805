//! # Livegrid Server
//!
//! Binds the ingestion transports and the optional HTTP read API around one
//! shared engine.
//!
//! ```text
//!              ┌──────────── Arc<Engine> ────────────┐
//! UDP :9999 ──→│ apply_datagram                      │
//! TCP :port ──→│ apply_line (per connection)         │──→ HTTP /api/*
//!              │ snapshot ──→ reporter (log summary) │
//!              └─────────────────────────────────────┘
//! ```
//!
//! A transport that fails to bind or stops accepting is logged and dropped;
//! the others keep running.

pub mod config;
pub mod error;
pub mod http;
pub mod listeners;
pub mod reporter;

pub use config::{SchemaKind, ServerConfig, DEFAULT_CONFIG_NAME};
pub use error::{ServerError, ServerResult};
pub use listeners::{TcpIngest, UdpIngest};

use axum::Router;
use livegrid_engine::{events, transcript, DocumentSchema, Engine, FormatDetector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

/// Run until ctrl-c, or until every task has stopped
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    tracing::info!("Starting livegrid ({:?} schema)", config.schema);

    match config.schema {
        SchemaKind::Transcript => {
            let engine = Arc::new(transcript::engine(config.flash_timing()));
            let app = http::transcript_router(Arc::clone(&engine));
            serve_engine(&config, engine, app).await
        }
        SchemaKind::Events => {
            let engine = Arc::new(events::engine());
            let app = http::events_router(Arc::clone(&engine));
            serve_engine(&config, engine, app).await
        }
    }
}

async fn serve_engine<S, D>(config: &ServerConfig, engine: Arc<Engine<S, D>>, app: Router) -> ServerResult<()>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    let mut tasks: JoinSet<ServerResult<()>> = JoinSet::new();
    let mut first_error: Option<ServerError> = None;
    let mut ingesting = 0;

    if let Some(port) = config.udp_port {
        match bind_udp(config, port).await {
            Ok(udp) => {
                let engine = Arc::clone(&engine);
                tasks.spawn(async move {
                    udp.run(engine).await;
                    Ok(())
                });
                ingesting += 1;
            }
            Err(e) => record_bind_error(&mut first_error, e),
        }
    }

    if let Some(port) = config.tcp_port {
        match bind_tcp(config, port).await {
            Ok(tcp) => {
                tasks.spawn(tcp.run(Arc::clone(&engine)));
                ingesting += 1;
            }
            Err(e) => record_bind_error(&mut first_error, e),
        }
    }

    if ingesting == 0 {
        return Err(first_error.unwrap_or(ServerError::NoTransport));
    }

    if let Some(port) = config.http_port {
        match bind_http(config, port).await {
            Ok(listener) => {
                tasks.spawn(http::serve(listener, app));
            }
            Err(e) => tracing::error!("[HTTP] {}", e),
        }
    }

    if let Some(interval) = config.report_interval() {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            reporter::run(engine, interval).await;
            Ok(())
        });
    }

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => tracing::info!("Shutting down"),
                    Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
                }
                break;
            }
            joined = tasks.join_next() => match joined {
                None => break,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => tracing::error!("Transport stopped: {}", e),
                Some(Err(e)) => tracing::error!("Task failed: {}", e),
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

fn record_bind_error(first_error: &mut Option<ServerError>, e: ServerError) {
    tracing::error!("{}", e);
    if first_error.is_none() {
        *first_error = Some(e);
    }
}

async fn bind_udp(config: &ServerConfig, port: u16) -> ServerResult<UdpIngest> {
    UdpIngest::bind(config.socket_addr(port)?).await
}

async fn bind_tcp(config: &ServerConfig, port: u16) -> ServerResult<TcpIngest> {
    TcpIngest::bind(config.socket_addr(port)?).await
}

async fn bind_http(config: &ServerConfig, port: u16) -> ServerResult<TcpListener> {
    let addr = config.socket_addr(port)?;
    TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
        transport: "http",
        addr,
        source,
    })
}
