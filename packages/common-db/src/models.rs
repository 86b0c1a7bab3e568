//! Modelos de dados do agendamento de consultas
//!
//! Este módulo define as estruturas de dados principais usadas pelo agendador
//! e pela API. A forma textual dos enums (ex.: `in-progress`, `no-show`) é a
//! mesma no JSON e nas colunas do banco.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Valor textual que não corresponde a nenhuma variante conhecida
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Valor inválido para {field}: {value}")]
pub struct InvalidValue {
    pub field: &'static str,
    pub value: String,
}

impl InvalidValue {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Status possíveis de um agendamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    /// Agendamento inicial, pendente de confirmação
    Scheduled,
    /// Confirmado pelo paciente
    Confirmed,
    /// Consulta em andamento
    InProgress,
    /// Consulta concluída
    Completed,
    /// Cancelado
    Cancelled,
    /// Paciente não compareceu
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    /// Se o agendamento ocupa o horário do médico.
    ///
    /// Apenas `cancelled` e `no-show` liberam o horário; `completed` continua
    /// ocupando, pois a consulta de fato aconteceu naquele horário.
    pub fn occupies_slot(&self) -> bool {
        !matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Estados sem progressão natural (concluído, cancelado, falta)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidValue::new("status", s))
    }
}

/// Tipo de consulta
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    Checkup,
    Emergency,
    Procedure,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 5] = [
        AppointmentType::Consultation,
        AppointmentType::FollowUp,
        AppointmentType::Checkup,
        AppointmentType::Emergency,
        AppointmentType::Procedure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::FollowUp => "follow-up",
            AppointmentType::Checkup => "checkup",
            AppointmentType::Emergency => "emergency",
            AppointmentType::Procedure => "procedure",
        }
    }
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InvalidValue::new("type", s))
    }
}

/// Prioridade de atendimento
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(InvalidValue::new("priority", s)),
        }
    }
}

/// Quem solicitou o cancelamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    Admin,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Patient => "patient",
            CancelledBy::Doctor => "doctor",
            CancelledBy::Admin => "admin",
        }
    }
}

impl FromStr for CancelledBy {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(CancelledBy::Patient),
            "doctor" => Ok(CancelledBy::Doctor),
            "admin" => Ok(CancelledBy::Admin),
            _ => Err(InvalidValue::new("cancelledBy", s)),
        }
    }
}

/// Horário de parede no formato 24h `HH:MM`
///
/// Aceita hora com um dígito na entrada (`9:05`) e sempre grava `09:05`,
/// o que mantém a ordenação textual da coluna igual à cronológica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn parse(value: &str) -> Result<Self, InvalidValue> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(SlotTime)
            .map_err(|_| InvalidValue::new("time", value))
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for SlotTime {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotTime::parse(s)
    }
}

impl TryFrom<String> for SlotTime {
    type Error = InvalidValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SlotTime::parse(&value)
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

/// Unidade reservável da agenda: médico, data e horário
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "médico {} em {} às {}", self.doctor_id, self.date, self.time)
    }
}

/// Representa uma consulta/agendamento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Identificador único da consulta
    pub id: Uuid,
    /// Identificador do paciente
    pub patient_id: Uuid,
    /// Identificador do médico
    pub doctor_id: Uuid,
    /// Data da consulta (sem componente de hora)
    pub date: NaiveDate,
    /// Horário da consulta
    pub time: SlotTime,
    /// Duração prevista em minutos
    pub duration_minutes: i32,
    /// Status atual da consulta
    pub status: AppointmentStatus,
    /// Tipo de consulta
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    /// Motivo informado no agendamento
    pub reason: String,
    pub priority: Priority,
    /// Observações livres (criptografadas em repouso)
    pub notes: Option<String>,
    /// Sintomas relatados (criptografados em repouso)
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
    /// Agendamento anterior que este substitui
    pub rescheduled_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot {
            doctor_id: self.doctor_id,
            date: self.date,
            time: self.time,
        }
    }
}

/// Resumo de paciente ou médico vindo do cadastro externo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
}

/// Filtros de consulta sobre a tabela de agendamentos
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentQuery {
    /// Data inicial (inclusiva)
    pub date_from: Option<NaiveDate>,
    /// Data final (inclusiva)
    pub date_to: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Status a ser desconsiderado (ex.: cancelados na agenda do dia)
    pub exclude_status: Option<AppointmentStatus>,
}

impl AppointmentQuery {
    /// Agendamentos de um único dia
    pub fn on_day(date: NaiveDate) -> Self {
        Self {
            date_from: Some(date),
            date_to: Some(date),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, status: AppointmentStatus) -> Self {
        self.exclude_status = Some(status);
        self
    }
}

/// Janela de paginação (offset/limit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip_matches_serde() {
        for status in AppointmentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
        }
        assert!("in_progress".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_only_cancelled_and_no_show_release_slot() {
        let occupying: Vec<_> = AppointmentStatus::ALL
            .into_iter()
            .filter(AppointmentStatus::occupies_slot)
            .collect();
        assert_eq!(
            occupying,
            vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Confirmed,
                AppointmentStatus::InProgress,
                AppointmentStatus::Completed,
            ]
        );
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }

    #[test]
    fn test_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&AppointmentType::FollowUp).unwrap(),
            "\"follow-up\""
        );
        assert_eq!(
            "procedure".parse::<AppointmentType>().unwrap(),
            AppointmentType::Procedure
        );
    }

    #[test]
    fn test_slot_time_normalizes_and_rejects_garbage() {
        assert_eq!(SlotTime::parse("9:05").unwrap().to_string(), "09:05");
        assert_eq!(SlotTime::parse("23:59").unwrap().to_string(), "23:59");
        assert!(SlotTime::parse("24:00").is_err());
        assert!(SlotTime::parse("10:60").is_err());
        assert!(SlotTime::parse("10:00:00").is_err());
        assert!(SlotTime::parse("dez horas").is_err());

        let from_json: SlotTime = serde_json::from_str("\"14:30\"").unwrap();
        assert_eq!(from_json, SlotTime::from_hm(14, 30).unwrap());
        assert!(serde_json::from_str::<SlotTime>("\"2pm\"").is_err());
    }

    #[test]
    fn test_slot_time_orders_chronologically() {
        let early = SlotTime::parse("9:00").unwrap();
        let late = SlotTime::parse("10:00").unwrap();
        assert!(early < late);
        assert!(early.to_string() < late.to_string());
    }

    #[test]
    fn test_appointment_serializes_camel_case() {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            time: SlotTime::from_hm(10, 0).unwrap(),
            duration_minutes: 30,
            status: AppointmentStatus::NoShow,
            appointment_type: AppointmentType::Checkup,
            reason: "Check-up anual".into(),
            priority: Priority::default(),
            notes: None,
            symptoms: vec![],
            cancelled_by: None,
            cancellation_reason: None,
            rescheduled_from: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&appointment).unwrap();
        assert_eq!(json["patientId"], appointment.patient_id.to_string());
        assert_eq!(json["date"], "2025-01-10");
        assert_eq!(json["time"], "10:00");
        assert_eq!(json["status"], "no-show");
        assert_eq!(json["type"], "checkup");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["durationMinutes"], 30);
    }
}
