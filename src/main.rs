use printlink_api::app_state::AppState;
use printlink_api::config::load_config;
use printlink_api::http;
use printlink_api::infra::{postgres, redis};
use printlink_api::telemetry::init_telemetry;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if exists
    let _ = dotenvy::dotenv();

    let config = load_config().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::process::exit(1);
    });

    init_telemetry(&config.telemetry);

    tracing::info!("Initializing integrations...");

    let pg_pool = postgres::init_postgres(&config.integrations, &config.db).await;
    let redis_conn = redis::init_redis(&config.integrations).await;

    let app_state = AppState::new(
        config.service.clone(),
        config.auth.clone(),
        config.paymongo.clone(),
        config.payments.clone(),
        pg_pool.clone(),
        redis_conn,
    );

    // Graceful shutdown on ctrl-c
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = tx.send(());
    });

    let server = http::start_server(config, app_state);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
                return Err(e);
            }
        }
        _ = rx => {
            tracing::info!("Shutting down gracefully");
        }
    }

    if let Some(pool) = pg_pool {
        tracing::info!("Closing PostgreSQL connection pool");
        pool.close().await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
