use std::sync::Arc;

mod config;
mod error;
mod events;
mod models;
mod routes;
mod schema;
mod services;
mod store;

use config::{AppConfig, StoreBackend};
use forum_shared::clients::db::create_pool;
use forum_shared::clients::rabbitmq::RabbitMQClient;
use services::notification_service::NotificationService;
use store::{MemoryNotificationStore, NotificationStore, PgNotificationStore};

pub struct AppState {
    pub service: NotificationService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    forum_shared::middleware::init_tracing("forum-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    // Read by the AuthUser extractor
    std::env::set_var("JWT_SECRET", &config.jwt_secret);

    let store: Arc<dyn NotificationStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgNotificationStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory notification store, data is lost on restart");
            Arc::new(MemoryNotificationStore::new())
        }
    };

    let service = NotificationService::new(store, config.batch_failure_policy);
    tracing::info!(
        backend = ?config.store_backend,
        batch_failure_policy = ?service.policy(),
        "notification service ready"
    );

    let state = Arc::new(AppState { service });

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;

    // Spawn forum event subscriber
    let event_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_notification_events(event_state, rabbitmq).await {
            tracing::error!(error = %e, "notification event subscriber failed");
        }
    });

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "forum-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
