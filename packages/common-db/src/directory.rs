//! Cadastro mínimo de pacientes e médicos
//!
//! O agendador só precisa saber se um paciente/médico existe e exibir seu
//! nome; o CRUD completo desses cadastros pertence a outros módulos.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::PersonSummary;

/// Cadastro de pacientes e médicos sobre SQLite
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

fn person_from_row(row: &SqliteRow) -> Result<PersonSummary, sqlx::Error> {
    Ok(PersonSummary {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        specialization: row.try_get("specialization")?,
    })
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register_patient(&self, name: &str) -> Result<PersonSummary, DbError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO patients (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        debug!(patient_id = %id, "Paciente cadastrado");
        Ok(PersonSummary {
            id,
            name: name.to_string(),
            specialization: None,
        })
    }

    pub async fn register_doctor(
        &self,
        name: &str,
        specialization: Option<&str>,
    ) -> Result<PersonSummary, DbError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO doctors (id, name, specialization) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(specialization)
            .execute(&self.pool)
            .await?;

        debug!(doctor_id = %id, "Médico cadastrado");
        Ok(PersonSummary {
            id,
            name: name.to_string(),
            specialization: specialization.map(str::to_string),
        })
    }

    pub async fn find_patient(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError> {
        let row = sqlx::query("SELECT id, name, NULL AS specialization FROM patients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(person_from_row).transpose()?)
    }

    pub async fn find_doctor(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError> {
        let row = sqlx::query("SELECT id, name, specialization FROM doctors WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(person_from_row).transpose()?)
    }

    pub async fn patient_exists(&self, id: Uuid) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn doctor_exists(&self, id: Uuid) -> Result<bool, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doctors WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
