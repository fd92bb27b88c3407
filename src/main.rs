use std::{net::SocketAddr, sync::Arc};

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shorthop::geo::IpApiLocator;
use shorthop::handlers;
use shorthop::oplog::{LogLevel, LogPackage, LogStack, OperatorLog};
use shorthop::service::LinkService;
use shorthop::store::SqliteStore;
use shorthop::{config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shorthop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting shorthop on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // Open SQLite connection pool
    // CREATE the file if it doesn't exist yet
    let db = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            config
                .database_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .foreign_keys(true),
        )
        .await?;

    // Run embedded migrations (files in migrations/)
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations applied");

    // Build shared state: store, geolocator and operator log are explicit
    // dependencies of the service, never ambient globals.
    let oplog = OperatorLog::start(config.oplog.clone());
    let service = LinkService::new(
        Arc::new(SqliteStore::new(db)),
        Arc::new(IpApiLocator::new()?),
        oplog.clone(),
    );

    let state = Arc::new(AppState {
        config,
        service,
        oplog: oplog.clone(),
    });

    // ── Router ─────────────────────────────────────────────────────────────
    let app = Router::new()
        .route(
            "/shorturls",
            post(handlers::links::create),
        )
        .route("/shorturls/:code", get(handlers::links::stats))
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({ "status": "ok" })) }),
        )
        // Short-link redirect — must come LAST so the fixed routes take priority
        .route("/:code", get(handlers::redirect::redirect))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::request_oplog,
        ))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    // ── Serve ──────────────────────────────────────────────────────────────
    let bind_addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    oplog.emit(
        LogStack::Backend,
        LogLevel::Info,
        LogPackage::Service,
        format!("server started on {}", state.config.port),
        serde_json::json!({}),
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
