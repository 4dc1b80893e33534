//! vigil server entry point.
//!
//! Boots the HTTP server and, on ingest-enabled instances, the job-queue
//! producer and ingest worker. Read-only replicas run the same binary
//! with `INGEST_ENABLED=0` and serve queries and SSE only.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vigil::api;
use vigil::app_state::AppState;
use vigil::bus::redis::RedisEventBus;
use vigil::config::Config;
use vigil::ingest::{scheduler, EventWriter, IngestWorker, SourceRegistry};
use vigil::persistence::{schema, PgCheckpointStore, PgEventLog};
use vigil::queue::JobQueue;
use vigil::shutdown::{self, ShutdownSignal};
use vigil::sse::SseHub;

/// How long to wait for the queue tasks to drain after the signal.
const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration errors are fatal before any component starts.
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.env.default_log_level())),
        )
        .init();

    tracing::info!(
        env = %config.env,
        addr = %config.bind_addr(),
        ingest = config.ingest_enabled,
        "starting vigil"
    );

    // Storage.
    let pg_pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;
    schema::ensure_schema(&pg_pool).await?;

    let redis_pool = deadpool_redis::Config::from_url(&config.redis_url)
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))?;

    let event_log = Arc::new(PgEventLog::new(pg_pool.clone()));
    let checkpoints = Arc::new(PgCheckpointStore::new(pg_pool.clone()));
    let bus = Arc::new(RedisEventBus::new(redis_pool.clone(), &config.redis_url)?);

    // Fan-out hub. A failed bus subscription is not fatal: the instance
    // still serves list queries and catch-up, and a restart retries.
    let hub = Arc::new(SseHub::new(event_log.clone(), bus.clone()));
    if let Err(e) = hub.start().await {
        tracing::error!(error = %e, "sse hub start failed, live fan-out disabled");
    }

    let shutdown = ShutdownSignal::new();

    // Ingestion side, only when enabled.
    let mut ingest_tasks = Vec::new();
    if config.ingest_enabled {
        let registry = Arc::new(SourceRegistry::from_config(&config));
        let queue = JobQueue::new(redis_pool.clone());
        scheduler::install_jobs(&queue, &registry).await?;

        let writer = EventWriter::new(event_log.clone(), bus.clone());
        let worker = Arc::new(IngestWorker::new(registry, checkpoints, writer));

        ingest_tasks.push(queue.spawn_producer(&shutdown));
        ingest_tasks.push(queue.spawn_worker(worker.processor(), &shutdown));
    }

    // Router.
    let state = AppState {
        event_log,
        hub: hub.clone(),
    };
    let mut app = api::build_router(config.swagger)
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    // Signal handling: the waiter broadcasts; the stopper starts the
    // force-exit watchdog and closes the hub so that open SSE streams
    // end and the server can drain.
    {
        let signal = shutdown.clone();
        tokio::spawn(async move { signal.wait_for_signal().await });
    }
    {
        let hub = hub.clone();
        let mut rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = rx.recv().await;
            shutdown::spawn_watchdog();
            hub.stop();
        });
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "server listening");

    let mut server_rx = shutdown.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_rx.recv().await;
        })
        .await?;

    // HTTP is down and the hub is stopped; drain the queue tasks, then
    // close the Redis and database handles.
    for task in ingest_tasks {
        if tokio::time::timeout(TASK_DRAIN_TIMEOUT, task).await.is_err() {
            tracing::warn!("ingest task did not drain in time");
        }
    }
    redis_pool.close();
    pg_pool.close().await;

    tracing::info!("shutdown complete");
    Ok(())
}
