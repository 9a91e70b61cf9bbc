use std::sync::Arc;

use taskflow::api::router;
use taskflow::config::AppConfig;
use taskflow::db::Database;
use taskflow::repository::TaskRepository;
use taskflow::seed::seed_if_empty;
use taskflow::state::AppState;
use taskflow::viewmodel::TaskViewModel;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "taskflow=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;
    let db = Database::open(&config).await?;

    let repository = TaskRepository::sqlite(db.clone());
    if config.seed {
        seed_if_empty(&repository).await?;
    }

    let view_model = Arc::new(TaskViewModel::new(repository));
    let state = AppState {
        db: db.clone(),
        view_model: view_model.clone(),
    };

    let app = router(state);

    info!("listening on http://{}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(db.clone()))
        .await?;

    view_model.close().await;
    db.close().await;

    Ok(())
}

async fn shutdown_signal(db: Database) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
    // Open event streams never end on their own.
    db.stop_live_queries();
}
