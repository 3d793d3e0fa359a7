use axum::{routing::get, Router};
use mimalloc::MiMalloc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_system::{
    catalog::HttpEventCatalog,
    config::Config,
    controllers,
    database::Database,
    lock::RedisLockStore,
    repository::{PgBookingRepository, PgSeatRepository, PgTxManager},
    services::BookingCoordinator,
    AppState,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking API");

    let db = Database::new(&config.database.url, config.database.pool_size)
        .await
        .expect("Failed to connect to database");
    info!("Database connected");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    let lock_store = RedisLockStore::connect(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    info!("Redis connected");

    let catalog = HttpEventCatalog::new(
        &config.event_api.base_url,
        Duration::from_secs(config.event_api.timeout_seconds),
    );

    let coordinator = BookingCoordinator::new(
        Arc::new(lock_store),
        Arc::new(catalog),
        PgTxManager::new(db.pool.clone()),
        Arc::new(PgSeatRepository::new(config.features.legacy_seat_fallback)),
        Arc::new(PgBookingRepository::new(db.pool.clone())),
        Duration::from_secs(config.booking.lock_ttl_seconds),
    );

    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        coordinator,
    });

    let app = Router::new()
        .route("/", get(|| async { "Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http());

    let host = config
        .app
        .host
        .parse()
        .expect("HOST must be a valid IP address");
    let addr = SocketAddr::new(host, config.app.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service())
        .await
        .unwrap();
}
