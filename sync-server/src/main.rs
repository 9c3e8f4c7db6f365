//! sync-server — CRM synchronization engine
//!
//! Runs three long-lived components over one SQLite database:
//! - sync worker: drains the durable queue of local mutations into the CRM
//! - reconciler: periodic pull of deal stages + invoice materialization
//! - HTTP surface: webhook ingest and the operator status endpoint

use std::sync::Arc;
use sync_server::api;
use sync_server::config::Config;
use sync_server::crm::CrmClient;
use sync_server::crm::rest::RestCrmClient;
use sync_server::db::DbService;
use sync_server::invoice::{InvoiceMaterializer, RestDocumentFetcher};
use sync_server::reconcile::Reconciler;
use sync_server::stages::StageMapper;
use sync_server::state::AppState;
use sync_server::sync::worker::SyncWorker;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_server=info,tower_http=warn".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Starting sync-server");

    let db = DbService::new(&config.database_path).await?;
    let crm: Arc<dyn CrmClient> = Arc::new(RestCrmClient::new(&config)?);
    let stages = Arc::new(StageMapper::new(crm.clone(), config.clone()));
    let fetcher = Arc::new(RestDocumentFetcher::new(&config)?);
    let materializer = Arc::new(InvoiceMaterializer::new(
        db.pool.clone(),
        crm.clone(),
        fetcher,
        config.clone(),
    ));

    let shutdown = CancellationToken::new();

    let worker = SyncWorker::new(
        db.pool.clone(),
        crm.clone(),
        stages.clone(),
        config.clone(),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let reconciler = Reconciler::new(
        db.pool.clone(),
        crm.clone(),
        stages.clone(),
        materializer,
        config.clone(),
        shutdown.clone(),
    );
    let reconciler_handle = tokio::spawn(reconciler.run());

    let state = AppState { pool: db.pool.clone(), stages, config: config.clone() };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "HTTP listener bound");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = server_shutdown.cancelled() => {},
            }
        })
        .await?;

    tracing::info!("Stopping background workers");
    shutdown.cancel();
    let _ = worker_handle.await;
    let _ = reconciler_handle.await;

    Ok(())
}
