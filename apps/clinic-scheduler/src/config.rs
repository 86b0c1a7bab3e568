//! Configuração do serviço lida do ambiente

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use common_db::DbConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

/// Filtro de log padrão quando `RUST_LOG` não está definido
pub fn default_log_filter() -> &'static str {
    "info,clinic_scheduler=debug"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => bail!("Formato de log desconhecido: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db: DbConfig,
    pub max_concurrent_requests: usize,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Monta a configuração a partir de uma função de busca de variáveis
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DbConfig::default();

        let bind_addr = lookup("SCHEDULER_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("SCHEDULER_BIND_ADDR inválido")?;

        let key_phrase = lookup("SCHEDULER_DB_KEY")
            .filter(|value| !value.is_empty())
            .context("SCHEDULER_DB_KEY deve ser definido")?;

        let max_connections = match lookup("SCHEDULER_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<u32>()
                .context("SCHEDULER_DB_MAX_CONNECTIONS inválido")?,
            None => defaults.max_connections,
        };
        if max_connections == 0 {
            bail!("SCHEDULER_DB_MAX_CONNECTIONS deve ser maior que zero");
        }

        let max_concurrent_requests = match lookup("SCHEDULER_MAX_CONCURRENT_REQUESTS") {
            Some(raw) => raw
                .parse::<usize>()
                .context("SCHEDULER_MAX_CONCURRENT_REQUESTS inválido")?,
            None => DEFAULT_MAX_CONCURRENT_REQUESTS,
        };
        if max_concurrent_requests == 0 {
            bail!("SCHEDULER_MAX_CONCURRENT_REQUESTS deve ser maior que zero");
        }

        let log_format = match lookup("SCHEDULER_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            db: DbConfig {
                db_path: lookup("SCHEDULER_DB_PATH").unwrap_or(defaults.db_path),
                key_phrase,
                max_connections,
            },
            max_concurrent_requests,
            log_format,
        })
    }
}
