//! Persistência do agendador de consultas
//!
//! Reúne o modelo de agendamento, o esquema SQLite com suas migrações, a
//! cifragem das anotações clínicas e os repositórios usados pelo serviço.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod appointments;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod migrations;
pub mod models;

pub use appointments::AppointmentStore;
pub use crypto::EncryptionKey;
pub use directory::SqliteDirectory;
pub use error::DbError;

/// Escritas concorrentes no mesmo horário esperam o lock em vez de falhar
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct DbConfig {
    /// Arquivo SQLite; o diretório é criado se faltar
    pub db_path: String,
    /// Senha da qual a chave das anotações é derivada
    pub key_phrase: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_path: "data/clinic.db".to_string(),
            key_phrase: String::new(),
            max_connections: 5,
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("db_path", &self.db_path)
            .field("key_phrase", &"***")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

fn ensure_parent_dir(db_path: &Path) -> Result<()> {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => std::fs::create_dir_all(dir)
            .with_context(|| format!("Falha ao criar diretório {}", dir.display())),
        _ => Ok(()),
    }
}

fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("synchronous", "NORMAL")
}

/// Abre o pool e deixa o esquema na versão mais recente
pub async fn init_db_pool(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = Path::new(&config.db_path);
    ensure_parent_dir(db_path)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(connect_options(db_path))
        .await
        .with_context(|| format!("Falha ao abrir banco {}", config.db_path))?;

    migrations::run_migrations(&pool)
        .await
        .context("Falha ao migrar esquema")?;

    info!(
        path = %config.db_path,
        schema_version = migrations::latest_version(),
        "Banco de agendamentos pronto"
    );
    Ok(pool)
}

/// Carrega (ou cria na primeira execução) o salt do banco e deriva a chave
/// de criptografia a partir da senha configurada
pub async fn open_encryption_key(pool: &SqlitePool, key_phrase: &str) -> Result<EncryptionKey> {
    let candidate = crypto::generate_salt();

    // INSERT OR IGNORE: duas instâncias subindo juntas ficam com o mesmo salt
    sqlx::query("INSERT OR IGNORE INTO encryption_salt (id, salt) VALUES (1, ?)")
        .bind(candidate.as_slice())
        .execute(pool)
        .await
        .context("Falha ao registrar salt de criptografia")?;

    let salt: Vec<u8> = sqlx::query_scalar("SELECT salt FROM encryption_salt WHERE id = 1")
        .fetch_one(pool)
        .await
        .context("Falha ao ler salt de criptografia")?;

    let key = EncryptionKey::derive(key_phrase, &salt)
        .context("Falha ao derivar chave de criptografia")?;
    Ok(key)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Banco descartável já migrado
    pub async fn temp_pool() -> Result<(TempDir, SqlitePool)> {
        let dir = tempfile::tempdir()?;
        let pool = init_db_pool(&DbConfig {
            db_path: dir.path().join("agenda.db").to_string_lossy().into_owned(),
            key_phrase: "senha-de-teste".to_string(),
            max_connections: 4,
        })
        .await?;
        Ok((dir, pool))
    }
}
