use std::net::SocketAddr;
use std::sync::Arc;

use tandem_api::{
    app,
    state::{AppState, AuthConfig},
};
use tandem_store::{
    DbClient, PgBookingRepository, PgReviewRepository, PgRideRepository, PgSeatLedger, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tandem_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tandem API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let redis = match RedisClient::new(&config.redis.url).await {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::warn!("Redis unavailable, rate limiting disabled: {}", err);
            None
        }
    };

    let app_state = AppState {
        ledger: Arc::new(PgSeatLedger::new(db.pool.clone())),
        rides: Arc::new(PgRideRepository::new(db.pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
        reviews: Arc::new(PgReviewRepository::new(db.pool.clone())),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
