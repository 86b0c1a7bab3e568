//! Repositório SQLite de agendamentos
//!
//! A unicidade de horário ativo por médico é garantida pelo índice parcial
//! `idx_appointments_active_slot`; uma inserção ou atualização que o viole
//! retorna `DbError::ConstraintViolation`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::{self, EncryptedData, EncryptionKey};
use crate::error::DbError;
use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentType, CancelledBy, PageWindow,
    Priority, Slot, SlotTime,
};

const SELECT_APPOINTMENTS: &str = "SELECT id, patient_id, doctor_id, date, time, duration_minutes, \
     status, type, reason, priority, notes_ciphertext, notes_nonce, symptoms_ciphertext, \
     symptoms_nonce, cancelled_by, cancellation_reason, rescheduled_from, created_at, updated_at \
     FROM appointments";

/// Linha crua da tabela, com as anotações ainda criptografadas
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    time: SlotTime,
    duration_minutes: i32,
    status: AppointmentStatus,
    appointment_type: AppointmentType,
    reason: String,
    priority: Priority,
    notes: Option<EncryptedData>,
    symptoms: Option<EncryptedData>,
    cancelled_by: Option<CancelledBy>,
    cancellation_reason: Option<String>,
    rescheduled_from: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Decodifica uma coluna textual para um tipo com `FromStr`
fn decode_text<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn decode_optional_text<T>(row: &SqliteRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse())
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

fn decode_sealed(
    row: &SqliteRow,
    ciphertext_column: &str,
    nonce_column: &str,
) -> sqlx::Result<Option<EncryptedData>> {
    let ciphertext: Option<Vec<u8>> = row.try_get(ciphertext_column)?;
    let nonce: Option<Vec<u8>> = row.try_get(nonce_column)?;
    Ok(match (ciphertext, nonce) {
        (Some(ciphertext), Some(nonce)) => Some(EncryptedData { ciphertext, nonce }),
        _ => None,
    })
}

impl FromRow<'_, SqliteRow> for AppointmentRow {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            date: row.try_get("date")?,
            time: decode_text(row, "time")?,
            duration_minutes: row.try_get("duration_minutes")?,
            status: decode_text(row, "status")?,
            appointment_type: decode_text(row, "type")?,
            reason: row.try_get("reason")?,
            priority: decode_text(row, "priority")?,
            notes: decode_sealed(row, "notes_ciphertext", "notes_nonce")?,
            symptoms: decode_sealed(row, "symptoms_ciphertext", "symptoms_nonce")?,
            cancelled_by: decode_optional_text(row, "cancelled_by")?,
            cancellation_reason: row.try_get("cancellation_reason")?,
            rescheduled_from: row.try_get("rescheduled_from")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Anotações prontas para gravação
struct SealedNotes {
    notes: Option<EncryptedData>,
    symptoms: Option<EncryptedData>,
}

impl SealedNotes {
    fn notes_ciphertext(&self) -> Option<&[u8]> {
        self.notes.as_ref().map(|n| n.ciphertext.as_slice())
    }

    fn notes_nonce(&self) -> Option<&[u8]> {
        self.notes.as_ref().map(|n| n.nonce.as_slice())
    }

    fn symptoms_ciphertext(&self) -> Option<&[u8]> {
        self.symptoms.as_ref().map(|s| s.ciphertext.as_slice())
    }

    fn symptoms_nonce(&self) -> Option<&[u8]> {
        self.symptoms.as_ref().map(|s| s.nonce.as_slice())
    }
}

/// Repositório de agendamentos com anotações criptografadas
#[derive(Debug, Clone)]
pub struct AppointmentStore {
    pool: SqlitePool,
    key: EncryptionKey,
}

impl AppointmentStore {
    pub fn new(pool: SqlitePool, key: EncryptionKey) -> Self {
        Self { pool, key }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn seal(&self, appointment: &Appointment) -> Result<SealedNotes, DbError> {
        let notes = appointment
            .notes
            .as_deref()
            .map(|notes| crypto::encrypt(notes.as_bytes(), &self.key))
            .transpose()?;

        let symptoms = if appointment.symptoms.is_empty() {
            None
        } else {
            let encoded = serde_json::to_vec(&appointment.symptoms)
                .map_err(|e| DbError::InternalError(e.to_string()))?;
            Some(crypto::encrypt(&encoded, &self.key)?)
        };

        Ok(SealedNotes { notes, symptoms })
    }

    fn open(&self, row: AppointmentRow) -> Result<Appointment, DbError> {
        let notes = match row.notes {
            Some(sealed) => {
                let plaintext = crypto::decrypt(&sealed, &self.key)?;
                Some(String::from_utf8(plaintext).map_err(|e| {
                    DbError::CryptoError(format!("Observação com UTF-8 inválido: {}", e))
                })?)
            }
            None => None,
        };

        let symptoms = match row.symptoms {
            Some(sealed) => {
                let plaintext = crypto::decrypt(&sealed, &self.key)?;
                serde_json::from_slice(&plaintext).map_err(|e| {
                    DbError::CryptoError(format!("Lista de sintomas inválida: {}", e))
                })?
            }
            None => Vec::new(),
        };

        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            date: row.date,
            time: row.time,
            duration_minutes: row.duration_minutes,
            status: row.status,
            appointment_type: row.appointment_type,
            reason: row.reason,
            priority: row.priority,
            notes,
            symptoms,
            cancelled_by: row.cancelled_by,
            cancellation_reason: row.cancellation_reason,
            rescheduled_from: row.rescheduled_from,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_APPOINTMENTS);
        builder.push(" WHERE id = ").push_bind(id);

        let row = builder
            .build_query_as::<AppointmentRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| self.open(row)).transpose()
    }

    /// Agendamento que ocupa o horário, ignorando `exclude` (o próprio
    /// agendamento numa remarcação)
    pub async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_APPOINTMENTS);
        builder
            .push(" WHERE doctor_id = ")
            .push_bind(slot.doctor_id)
            .push(" AND date = ")
            .push_bind(slot.date)
            .push(" AND time = ")
            .push_bind(slot.time.to_string())
            .push(" AND status NOT IN ('cancelled', 'no-show')");
        if let Some(id) = exclude {
            builder.push(" AND id <> ").push_bind(id);
        }
        builder.push(" LIMIT 1");

        let row = builder
            .build_query_as::<AppointmentRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| self.open(row)).transpose()
    }

    pub async fn insert(&self, appointment: &Appointment) -> Result<(), DbError> {
        let sealed = self.seal(appointment)?;

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, patient_id, doctor_id, date, time, duration_minutes, status, type, reason,
                priority, notes_ciphertext, notes_nonce, symptoms_ciphertext, symptoms_nonce,
                cancelled_by, cancellation_reason, rescheduled_from, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.date)
        .bind(appointment.time.to_string())
        .bind(appointment.duration_minutes)
        .bind(appointment.status.as_str())
        .bind(appointment.appointment_type.as_str())
        .bind(&appointment.reason)
        .bind(appointment.priority.as_str())
        .bind(sealed.notes_ciphertext())
        .bind(sealed.notes_nonce())
        .bind(sealed.symptoms_ciphertext())
        .bind(sealed.symptoms_nonce())
        .bind(appointment.cancelled_by.map(|c| c.as_str()))
        .bind(appointment.cancellation_reason.as_deref())
        .bind(appointment.rescheduled_from)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(appointment_id = %appointment.id, "Agendamento gravado");
        Ok(())
    }

    /// Regrava os campos mutáveis; paciente, médico e criação são imutáveis
    pub async fn update(&self, appointment: &Appointment) -> Result<(), DbError> {
        let sealed = self.seal(appointment)?;

        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                date = ?, time = ?, duration_minutes = ?, status = ?, type = ?, reason = ?,
                priority = ?, notes_ciphertext = ?, notes_nonce = ?, symptoms_ciphertext = ?,
                symptoms_nonce = ?, cancelled_by = ?, cancellation_reason = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(appointment.date)
        .bind(appointment.time.to_string())
        .bind(appointment.duration_minutes)
        .bind(appointment.status.as_str())
        .bind(appointment.appointment_type.as_str())
        .bind(&appointment.reason)
        .bind(appointment.priority.as_str())
        .bind(sealed.notes_ciphertext())
        .bind(sealed.notes_nonce())
        .bind(sealed.symptoms_ciphertext())
        .bind(sealed.symptoms_nonce())
        .bind(appointment.cancelled_by.map(|c| c.as_str()))
        .bind(appointment.cancellation_reason.as_deref())
        .bind(appointment.updated_at)
        .bind(appointment.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Agendamento {}", appointment.id)));
        }

        debug!(appointment_id = %appointment.id, "Agendamento atualizado");
        Ok(())
    }

    /// Lista ordenada por data e horário; `window` nulo traz tudo
    pub async fn list(
        &self,
        query: &AppointmentQuery,
        window: Option<PageWindow>,
    ) -> Result<Vec<Appointment>, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_APPOINTMENTS);
        push_filters(&mut builder, query);
        builder.push(" ORDER BY date ASC, time ASC, created_at ASC, id ASC");
        if let Some(window) = window {
            builder
                .push(" LIMIT ")
                .push_bind(i64::from(window.limit))
                .push(" OFFSET ")
                .push_bind(i64::try_from(window.offset).unwrap_or(i64::MAX));
        }

        let rows = builder
            .build_query_as::<AppointmentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(|row| self.open(row)).collect()
    }

    pub async fn count(&self, query: &AppointmentQuery) -> Result<u64, DbError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM appointments");
        push_filters(&mut builder, query);

        let total: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(total.max(0) as u64)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(AppointmentStatus, u64)>, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM appointments GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        grouped_counts(rows)
    }

    pub async fn count_by_type(&self) -> Result<Vec<(AppointmentType, u64)>, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT type, COUNT(*) FROM appointments GROUP BY type")
                .fetch_all(&self.pool)
                .await?;
        grouped_counts(rows)
    }
}

fn grouped_counts<T>(rows: Vec<(String, i64)>) -> Result<Vec<(T, u64)>, DbError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    rows.into_iter()
        .map(|(key, count)| {
            key.parse::<T>()
                .map(|parsed| (parsed, count.max(0) as u64))
                .map_err(|e| DbError::QueryError(e.to_string()))
        })
        .collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &AppointmentQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(from) = query.date_from {
        builder.push(" AND date >= ").push_bind(from);
    }
    if let Some(to) = query.date_to {
        builder.push(" AND date <= ").push_bind(to);
    }
    if let Some(doctor_id) = query.doctor_id {
        builder.push(" AND doctor_id = ").push_bind(doctor_id);
    }
    if let Some(patient_id) = query.patient_id {
        builder.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(excluded) = query.exclude_status {
        builder.push(" AND status <> ").push_bind(excluded.as_str());
    }
}
