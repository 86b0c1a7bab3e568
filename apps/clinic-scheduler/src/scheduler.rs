//! Agendador de consultas
//!
//! Ciclo de vida do agendamento: criação com detecção de conflito,
//! remarcação, cancelamento, atualização de campos e consultas.
//!
//! Invariante central: no máximo um agendamento com status que ocupa
//! horário (`scheduled`, `confirmed`, `in-progress`, `completed`) por
//! médico/data/horário. A verificação prévia dá a mensagem de conflito; o
//! índice único parcial do banco fecha a janela entre verificar e gravar,
//! e sua violação também vira `SchedulerError::Conflict`.

use chrono::{Datelike, Local, Months, NaiveDate, Utc};
use common_db::models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentType, CancelledBy, PageWindow,
    PersonSummary, Priority, Slot, SlotTime,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Entity, SchedulerError};
use crate::policy::{self, DEFAULT_DURATION_MINUTES};
use crate::store::{AppointmentRepository, Directory};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Dados para um novo agendamento
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    pub appointment_type: AppointmentType,
    pub reason: String,
    pub duration_minutes: Option<i32>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub symptoms: Vec<String>,
    /// Agendamento que este substitui, quando a recepção remarca criando
    /// um novo registro
    pub rescheduled_from: Option<Uuid>,
}

/// Alteração genérica de campos.
///
/// Não há data, horário nem médico aqui: mudar o horário passa sempre por
/// `reschedule_appointment`, que refaz a verificação de conflito.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<AppointmentStatus>,
    pub duration_minutes: Option<i32>,
    /// Texto em branco apaga a observação
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
}

/// Filtros da listagem paginada
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Dia exato; ignorado quando há intervalo
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListFilter {
    fn to_query(&self) -> AppointmentQuery {
        let (date_from, date_to) = if self.start_date.is_some() || self.end_date.is_some() {
            (self.start_date, self.end_date)
        } else {
            (self.date, self.date)
        };

        AppointmentQuery {
            date_from,
            date_to,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            status: self.status,
            exclude_status: None,
        }
    }
}

/// Agendamento com paciente e médico resolvidos
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<PersonSummary>,
    pub doctor: Option<PersonSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPage {
    pub appointments: Vec<AppointmentDetails>,
    pub total_pages: u64,
    pub current_page: u32,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    /// Agendamentos não cancelados de hoje
    pub today: u64,
    /// Agendamentos não cancelados do mês corrente
    pub this_month: u64,
    pub by_status: BTreeMap<AppointmentStatus, u64>,
    pub by_type: BTreeMap<AppointmentType, u64>,
}

/// Data corrente no fuso do servidor
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Observação em branco equivale a nenhuma
fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.filter(|text| !text.trim().is_empty())
}

fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

/// Serviço de agendamento sobre um repositório e um cadastro
pub struct Scheduler<R, D> {
    appointments: R,
    directory: D,
}

impl<R, D> Scheduler<R, D>
where
    R: AppointmentRepository,
    D: Directory,
{
    pub fn new(appointments: R, directory: D) -> Self {
        Self {
            appointments,
            directory,
        }
    }

    pub fn repository(&self) -> &R {
        &self.appointments
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Página de agendamentos ordenada por data e horário
    pub async fn list_appointments(
        &self,
        filter: ListFilter,
    ) -> Result<AppointmentPage, SchedulerError> {
        let page = filter.page.unwrap_or(DEFAULT_PAGE);
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(SchedulerError::Validation(
                "page deve ser maior ou igual a 1".to_string(),
            ));
        }
        if limit < 1 {
            return Err(SchedulerError::Validation(
                "limit deve ser maior ou igual a 1".to_string(),
            ));
        }
        let limit = limit.min(MAX_PAGE_SIZE);

        let query = filter.to_query();
        let total = self.appointments.count(&query).await?;
        let window = PageWindow {
            offset: u64::from(page - 1) * u64::from(limit),
            limit,
        };
        let rows = self.appointments.list(&query, Some(window)).await?;

        Ok(AppointmentPage {
            appointments: self.resolve_all(rows).await?,
            total_pages: (total + u64::from(limit) - 1) / u64::from(limit),
            current_page: page,
            total,
        })
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<AppointmentDetails, SchedulerError> {
        let appointment = self.fetch(id).await?;
        self.resolve(appointment).await
    }

    pub async fn create_appointment(
        &self,
        request: NewAppointment,
    ) -> Result<AppointmentDetails, SchedulerError> {
        policy::validate_reason(&request.reason)?;
        let duration_minutes = request
            .duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES);
        policy::validate_duration(duration_minutes)?;

        if !self.directory.patient_exists(request.patient_id).await? {
            return Err(SchedulerError::NotFound(Entity::Patient));
        }
        if !self.directory.doctor_exists(request.doctor_id).await? {
            return Err(SchedulerError::NotFound(Entity::Doctor));
        }
        if let Some(previous) = request.rescheduled_from {
            if self.appointments.find_by_id(previous).await?.is_none() {
                return Err(SchedulerError::NotFound(Entity::Appointment));
            }
        }

        let slot = Slot {
            doctor_id: request.doctor_id,
            date: request.date,
            time: request.time,
        };
        self.ensure_slot_free(&slot, None).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            date: request.date,
            time: request.time,
            duration_minutes,
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            reason: request.reason,
            priority: request.priority.unwrap_or_default(),
            notes: normalize_notes(request.notes),
            symptoms: request.symptoms,
            cancelled_by: None,
            cancellation_reason: None,
            rescheduled_from: request.rescheduled_from,
            created_at: now,
            updated_at: now,
        };

        self.appointments
            .insert(&appointment)
            .await
            .map_err(|e| self.slot_write_error(e, slot))?;

        info!(
            appointment_id = %appointment.id,
            doctor_id = %slot.doctor_id,
            date = %slot.date,
            time = %slot.time,
            "Agendamento criado"
        );
        self.resolve(appointment).await
    }

    /// Atualização genérica; não refaz a verificação de horário exceto
    /// quando o status volta a ocupar o horário
    pub async fn update_appointment(
        &self,
        id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<AppointmentDetails, SchedulerError> {
        let mut appointment = self.fetch(id).await?;

        if let Some(status) = patch.status {
            policy::ensure_transition(appointment.status, status)?;
            if policy::reoccupies_slot(appointment.status, status) {
                self.ensure_slot_free(&appointment.slot(), Some(id)).await?;
            }
            appointment.status = status;
        }
        if let Some(reason) = patch.reason {
            policy::validate_reason(&reason)?;
            appointment.reason = reason;
        }
        if let Some(duration) = patch.duration_minutes {
            policy::validate_duration(duration)?;
            appointment.duration_minutes = duration;
        }
        if let Some(kind) = patch.appointment_type {
            appointment.appointment_type = kind;
        }
        if let Some(priority) = patch.priority {
            appointment.priority = priority;
        }
        if patch.notes.is_some() {
            appointment.notes = normalize_notes(patch.notes);
        }
        if let Some(symptoms) = patch.symptoms {
            appointment.symptoms = symptoms;
        }
        appointment.updated_at = Utc::now();

        let slot = appointment.slot();
        self.appointments
            .update(&appointment)
            .await
            .map_err(|e| self.slot_write_error(e, slot))?;

        info!(appointment_id = %id, status = %appointment.status, "Agendamento atualizado");
        self.resolve(appointment).await
    }

    /// Cancela e libera o horário. Repetir o cancelamento apenas regrava os
    /// mesmos campos.
    pub async fn cancel_appointment(
        &self,
        id: Uuid,
        cancelled_by: CancelledBy,
        cancellation_reason: Option<String>,
    ) -> Result<AppointmentDetails, SchedulerError> {
        let mut appointment = self.fetch(id).await?;
        let previous_status = appointment.status;
        policy::ensure_transition(previous_status, AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_by = Some(cancelled_by);
        appointment.cancellation_reason = cancellation_reason;
        appointment.updated_at = Utc::now();

        self.appointments.update(&appointment).await?;

        info!(
            appointment_id = %id,
            cancelled_by = cancelled_by.as_str(),
            from_terminal = previous_status.is_terminal(),
            "Agendamento cancelado"
        );
        self.resolve(appointment).await
    }

    /// Remarca no próprio registro (mesmo id), com a mesma regra de
    /// conflito da criação, desconsiderando o próprio agendamento
    pub async fn reschedule_appointment(
        &self,
        id: Uuid,
        date: NaiveDate,
        time: SlotTime,
    ) -> Result<AppointmentDetails, SchedulerError> {
        let mut appointment = self.fetch(id).await?;
        let target = Slot {
            doctor_id: appointment.doctor_id,
            date,
            time,
        };
        self.ensure_slot_free(&target, Some(id)).await?;

        let previous = appointment.slot();
        appointment.date = date;
        appointment.time = time;
        appointment.updated_at = Utc::now();

        self.appointments
            .update(&appointment)
            .await
            .map_err(|e| self.slot_write_error(e, target))?;

        info!(
            appointment_id = %id,
            from = %previous,
            to = %target,
            terminal = appointment.status.is_terminal(),
            "Agendamento remarcado"
        );
        self.resolve(appointment).await
    }

    /// Agenda do dia corrente, sem cancelados, por horário
    pub async fn list_todays_appointments(
        &self,
    ) -> Result<Vec<AppointmentDetails>, SchedulerError> {
        self.list_day(today()).await
    }

    pub(crate) async fn list_day(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<AppointmentDetails>, SchedulerError> {
        let query = AppointmentQuery::on_day(day).excluding(AppointmentStatus::Cancelled);
        let rows = self.appointments.list(&query, None).await?;
        self.resolve_all(rows).await
    }

    pub async fn get_overview_stats(&self) -> Result<OverviewStats, SchedulerError> {
        self.overview_on(today()).await
    }

    pub(crate) async fn overview_on(&self, day: NaiveDate) -> Result<OverviewStats, SchedulerError> {
        let today_count = self
            .appointments
            .count(&AppointmentQuery::on_day(day).excluding(AppointmentStatus::Cancelled))
            .await?;

        let (first, last) = month_bounds(day);
        let month_query = AppointmentQuery {
            date_from: Some(first),
            date_to: Some(last),
            ..AppointmentQuery::default()
        }
        .excluding(AppointmentStatus::Cancelled);
        let month_count = self.appointments.count(&month_query).await?;

        let mut by_status: BTreeMap<_, _> =
            AppointmentStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        by_status.extend(self.appointments.count_by_status().await?);

        let mut by_type: BTreeMap<_, _> =
            AppointmentType::ALL.into_iter().map(|t| (t, 0)).collect();
        by_type.extend(self.appointments.count_by_type().await?);

        Ok(OverviewStats {
            today: today_count,
            this_month: month_count,
            by_status,
            by_type,
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Appointment, SchedulerError> {
        self.appointments
            .find_by_id(id)
            .await?
            .ok_or(SchedulerError::NotFound(Entity::Appointment))
    }

    async fn ensure_slot_free(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<(), SchedulerError> {
        if let Some(existing) = self.appointments.find_active_in_slot(slot, exclude).await? {
            warn!(
                existing_id = %existing.id,
                slot = %slot,
                "Conflito de horário"
            );
            return Err(SchedulerError::Conflict(*slot));
        }
        Ok(())
    }

    fn slot_write_error(&self, error: common_db::DbError, slot: Slot) -> SchedulerError {
        let error = SchedulerError::from_slot_write(error, slot);
        if let SchedulerError::Conflict(_) = error {
            warn!(slot = %slot, "Conflito de horário detectado na gravação");
        }
        error
    }

    async fn resolve(&self, appointment: Appointment) -> Result<AppointmentDetails, SchedulerError> {
        let patient = self.directory.find_patient(appointment.patient_id).await?;
        let doctor = self.directory.find_doctor(appointment.doctor_id).await?;
        Ok(AppointmentDetails {
            appointment,
            patient,
            doctor,
        })
    }

    async fn resolve_all(
        &self,
        appointments: Vec<Appointment>,
    ) -> Result<Vec<AppointmentDetails>, SchedulerError> {
        let mut details = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            details.push(self.resolve(appointment).await?);
        }
        Ok(details)
    }
}
