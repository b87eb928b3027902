use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voltra_api::{
    app,
    state::{AppState, AuthConfig, Metrics},
};
use voltra_catalog::ProductStore;
use voltra_core::report::{BlobStore, ErrorReporter, LogReporter, SpreadsheetWriter};
use voltra_core::search::SearchIndexer;
use voltra_offer::{ExportService, OfferManager, OfferStore};
use voltra_store::{
    Config, DbClient, FsBlobStore, PostgresOfferStore, PostgresProductStore, RedisSearchIndexer,
    XlsxSheetWriter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voltra_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Voltra API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let indexer: Arc<dyn SearchIndexer> = Arc::new(
        RedisSearchIndexer::new(&config.redis.url).expect("Failed to connect to Redis"),
    );

    let offer_store: Arc<dyn OfferStore> = Arc::new(PostgresOfferStore::new(db.pool.clone()));
    let product_store: Arc<dyn ProductStore> =
        Arc::new(PostgresProductStore::new(db.pool.clone()));

    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.export.storage_root));
    let sheets: Arc<dyn SpreadsheetWriter> = Arc::new(XlsxSheetWriter);
    let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);

    let offers = Arc::new(OfferManager::new(
        offer_store.clone(),
        product_store,
        indexer,
    ));
    let exports = Arc::new(ExportService::new(
        offer_store,
        blobs,
        sheets,
        reporter,
        config.export.row_cap,
        config.export.max_age_days,
    ));

    let metrics = Metrics::new().expect("Failed to register metrics");

    let app_state = AppState {
        offers,
        exports,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        metrics,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
