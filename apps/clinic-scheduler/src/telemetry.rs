//! Inicialização do tracing

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{default_log_filter, LogFormat};

/// Instala o subscriber global. `RUST_LOG` tem precedência sobre o filtro padrão.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow!("Falha ao inicializar tracing: {e}"))
}
