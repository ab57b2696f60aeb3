use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trainer_hub::api::routes::create_routes;
use trainer_hub::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use trainer_hub::services::NotificationService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let database = DatabaseConfig::from_env()?;
    let pool = database.create_pool().await?;
    run_migrations(&pool).await?;

    let notifications = NotificationService::new(config.notification_delay());

    if config.seed_database {
        DatabaseSeeder::new(pool.clone(), &config.jwt_secret, notifications.clone())
            .seed_all()
            .await?;
    }

    let app = create_routes(pool, &config.jwt_secret, notifications);

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!(environment = %config.environment, "Trainer hub listening on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
