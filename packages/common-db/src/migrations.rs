//! Migrações versionadas do banco SQLite
//!
//! A versão aplicada fica em `PRAGMA user_version`. Cada migração roda na
//! própria transação junto com a troca de versão.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Lote de SQL identificado por versão
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Em ordem crescente de versão, sem lacunas
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "esquema inicial da agenda",
        sql: r#"
    -- Cadastro mínimo de pacientes (colaborador externo do agendador)
    CREATE TABLE IF NOT EXISTS patients (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Cadastro mínimo de médicos (colaborador externo do agendador)
    CREATE TABLE IF NOT EXISTS doctors (
        id BLOB PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        specialization TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Tabela de agendamentos
    -- patient_id/doctor_id não têm FK: o cadastro pode viver em outro serviço
    CREATE TABLE IF NOT EXISTS appointments (
        id BLOB PRIMARY KEY NOT NULL,
        patient_id BLOB NOT NULL,
        doctor_id BLOB NOT NULL,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL DEFAULT 30,
        status TEXT NOT NULL CHECK (status IN ('scheduled', 'confirmed', 'in-progress', 'completed', 'cancelled', 'no-show')),
        type TEXT NOT NULL CHECK (type IN ('consultation', 'follow-up', 'checkup', 'emergency', 'procedure')),
        reason TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'medium' CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
        notes_ciphertext BLOB,
        notes_nonce BLOB,
        symptoms_ciphertext BLOB,
        symptoms_nonce BLOB,
        cancelled_by TEXT CHECK (cancelled_by IS NULL OR cancelled_by IN ('patient', 'doctor', 'admin')),
        cancellation_reason TEXT,
        rescheduled_from BLOB,
        created_at TIMESTAMP NOT NULL,
        updated_at TIMESTAMP NOT NULL,
        FOREIGN KEY (rescheduled_from) REFERENCES appointments (id) ON DELETE SET NULL
    );

    -- Salt da derivação da chave de criptografia (linha única)
    CREATE TABLE IF NOT EXISTS encryption_salt (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        salt BLOB NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    -- Índices para otimização
    CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments (patient_id);
    CREATE INDEX IF NOT EXISTS idx_appointments_doctor_date ON appointments (doctor_id, date, time);
    CREATE INDEX IF NOT EXISTS idx_appointments_date_time ON appointments (date, time);
    CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status);
    "#,
    },
    Migration {
        version: 2,
        name: "horário ativo único por médico",
        sql: r#"
    -- Um único agendamento ativo por médico/data/horário.
    -- Cancelados e faltas liberam o horário.
    CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_active_slot
        ON appointments (doctor_id, date, time)
        WHERE status NOT IN ('cancelled', 'no-show');
    "#,
    },
];

/// Versão mais recente conhecida por este binário
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .context("Falha ao ler versão do banco")
}

/// Aplica as migrações pendentes. Um banco gravado por versão mais nova
/// do serviço é recusado.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = current_version(pool).await?;
    let latest = latest_version();

    if current > latest {
        bail!(
            "Banco na versão {} é mais novo que o suportado ({})",
            current,
            latest
        );
    }
    if current == latest {
        debug!(version = current, "Esquema já atualizado");
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut transaction = pool
            .begin()
            .await
            .with_context(|| format!("Falha ao abrir transação da migração {}", migration.version))?;

        sqlx::query(migration.sql)
            .execute(&mut *transaction)
            .await
            .with_context(|| {
                format!("Falha na migração {} ({})", migration.version, migration.name)
            })?;

        // PRAGMA não aceita parâmetro ligado
        sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *transaction)
            .await
            .with_context(|| format!("Falha ao gravar versão {}", migration.version))?;

        transaction
            .commit()
            .await
            .with_context(|| format!("Falha ao confirmar migração {}", migration.version))?;

        info!(version = migration.version, name = migration.name, "Migração aplicada");
    }

    Ok(())
}
