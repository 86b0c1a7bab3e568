use anyhow::{Context, Result};
use clinic_scheduler::api::{self, AppState};
use clinic_scheduler::built_info;
use clinic_scheduler::config::AppConfig;
use clinic_scheduler::telemetry;
use common_db::{init_db_pool, open_encryption_key};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    telemetry::init_tracing(config.log_format)?;

    tracing::info!(
        version = built_info::PKG_VERSION,
        db = ?config.db,
        "Iniciando {}",
        built_info::PKG_NAME
    );

    let pool = init_db_pool(&config.db).await?;
    let key = open_encryption_key(&pool, &config.db.key_phrase).await?;

    let app = api::router(AppState::new(pool.clone(), key), config.max_concurrent_requests);

    tracing::info!(addr = %config.bind_addr, "Servidor HTTP escutando");
    axum::Server::try_bind(&config.bind_addr)
        .with_context(|| format!("Falha ao abrir {}", config.bind_addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Servidor HTTP encerrou com erro")?;

    pool.close().await;
    tracing::info!("Servidor encerrado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao aguardar sinal de encerramento: {e}");
    }
    tracing::info!("Sinal de encerramento recebido");
}
