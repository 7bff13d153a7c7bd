use anyhow::Result;
use axum::{middleware, response::Html, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use footfall::api;
use footfall::beacon::AnalyticsForwarder;
use footfall::cleanup::CleanupScheduler;
use footfall::config::Config;
use footfall::registry::{
    BanRegistry, ExclusionRegistry, SqliteBanRegistry, SqliteExclusionSource,
};
use footfall::storage::{SqliteVisitorStore, VisitorStore};
use footfall::tracking::{track_requests, TrackingProcessor, TrackingState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let sqlite =
        SqliteVisitorStore::new(&config.database.url, config.database.max_connections).await?;
    let pool = sqlite.pool();
    let store: Arc<dyn VisitorStore> = Arc::new(sqlite);

    info!("Initializing database...");
    store.init().await?;

    let bans = SqliteBanRegistry::new(Arc::clone(&pool));
    bans.init().await?;
    let bans: Arc<dyn BanRegistry> = Arc::new(bans);

    let exclusion_source = SqliteExclusionSource::new(pool);
    exclusion_source.init().await?;
    info!("Database initialized successfully");

    let exclusions = ExclusionRegistry::new(
        Arc::new(exclusion_source),
        config.tracking.untracked_prefixes.clone(),
    );

    // Beacon forwarder, disabled when no collector account is configured
    let forwarder = match config.analytics.account_id.as_deref() {
        Some(account_id) => {
            info!(account_id, "Analytics beacon enabled");
            Some(AnalyticsForwarder::new(
                &config.analytics.endpoint,
                account_id,
                config.analytics.beacon_timeout_secs,
            )?)
        }
        None => {
            info!("Analytics beacon disabled (ANALYTICS_ACCOUNT_ID not set)");
            None
        }
    };

    let tracking_state = Arc::new(TrackingState {
        processor: TrackingProcessor::new(Arc::clone(&store), exclusions),
        bans,
        forwarder,
    });

    // Background eviction of stale visitor records
    CleanupScheduler::new(
        Arc::clone(&store),
        config.tracking.retention_hours,
        config.tracking.cleanup_interval_secs,
    )
    .start();
    info!(
        retention_hours = config.tracking.retention_hours,
        interval_secs = config.tracking.cleanup_interval_secs,
        "Cleanup scheduler started"
    );

    let app = Router::new()
        .route("/", get(index))
        .merge(api::create_api_router(Arc::clone(&store)))
        .layer(middleware::from_fn_with_state(
            tracking_state,
            track_requests,
        ))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(
        "<html><head><title>footfall</title></head>\
         <body><p>Visitor tracking is running.</p></body></html>",
    )
}
