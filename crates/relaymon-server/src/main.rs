use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

use relaymon_common::proto::metric_service_server::MetricServiceServer;
use relaymon_common::sign::Signer;
use relaymon_storage::StoreOptions;

use relaymon_server::config::ServerConfig;
use relaymon_server::crypto::Decryptor;
use relaymon_server::service::MetricsService;
use relaymon_server::state::AppState;
use relaymon_server::{app, grpc};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("relaymon=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;

    tracing::info!(
        http_port = config.http_port,
        grpc_port = config.grpc_port,
        db = %config.redacted_database_url(),
        file = config.file_storage_path.as_deref().unwrap_or("<none>"),
        "relaymon-server starting"
    );

    let db = match &config.database_url {
        Some(url) => Some(relaymon_storage::connect(url).await?),
        None => None,
    };

    let shutdown = CancellationToken::new();

    let store_opts = StoreOptions {
        file_path: config.file_storage_path.clone().map(PathBuf::from),
        restore: config.restore,
        autosave_interval_secs: config.store_interval_secs,
    };
    let (store, autosave) =
        relaymon_storage::build_store(db.clone(), &store_opts, shutdown.clone()).await?;

    let signer = config.key.as_deref().and_then(Signer::new);
    if signer.is_some() {
        tracing::info!("request signing enabled");
    }
    let decryptor = match &config.crypto_key {
        Some(path) => {
            let d = Decryptor::load(std::path::Path::new(path))?;
            tracing::info!(path, "payload decryption enabled");
            Some(Arc::new(d))
        }
        None => None,
    };
    let trusted_subnet = config
        .trusted_subnet
        .as_deref()
        .map(|cidr| {
            cidr.parse::<ipnet::IpNet>()
                .with_context(|| format!("invalid trusted_subnet CIDR '{cidr}'"))
        })
        .transpose()?;

    let state = AppState {
        service: Arc::new(MetricsService::new(store.clone())),
        signer,
        decryptor,
        trusted_subnet,
        db,
    };

    // HTTP server.
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_app = app::build_http_app(state.clone());
    let http_token = shutdown.clone();
    let http_handle = tokio::spawn(async move {
        let server = axum::serve(http_listener, http_app)
            .with_graceful_shutdown(http_token.cancelled_owned());
        if let Err(e) = server.await {
            tracing::error!(error = %e, "http server error");
        }
    });

    // gRPC server.
    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.grpc_port).parse()?;
    let grpc_service = MetricServiceServer::new(grpc::MetricServiceImpl::new(state.clone()));
    let grpc_token = shutdown.clone();
    let grpc_handle = tokio::spawn(async move {
        let server = TonicServer::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_token.cancelled_owned());
        if let Err(e) = server.await {
            tracing::error!(error = %e, "grpc server error");
        }
    });

    tracing::info!(http = %http_addr, grpc = %grpc_addr, "server started");

    signal::ctrl_c().await?;
    tracing::info!("shutting down gracefully");
    shutdown.cancel();

    let mut handles = vec![http_handle, grpc_handle];
    if let Some(h) = autosave {
        handles.push(h);
    }
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "server task panicked");
        }
    }

    // One last save so nothing accepted before shutdown is lost.
    if let Err(e) = store.persist().await {
        tracing::error!(error = %e, "final save failed");
    }

    tracing::info!("server stopped");
    Ok(())
}
