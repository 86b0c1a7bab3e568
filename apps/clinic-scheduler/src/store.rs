//! Colaboradores do agendador
//!
//! O agendador depende de dois contratos: o repositório de agendamentos e
//! o cadastro de pacientes/médicos. As implementações SQLite vêm do
//! `common-db`; os testes trocam o cadastro por mocks.

use async_trait::async_trait;
use common_db::models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentType, PageWindow, PersonSummary,
    Slot,
};
use common_db::{AppointmentStore, DbError, SqliteDirectory};
use uuid::Uuid;

/// Persistência de agendamentos
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError>;

    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError>;

    /// Deve falhar com `DbError::ConstraintViolation` se o horário já
    /// estiver ocupado no momento da escrita
    async fn insert(&self, appointment: &Appointment) -> Result<(), DbError>;

    async fn update(&self, appointment: &Appointment) -> Result<(), DbError>;

    async fn list(
        &self,
        query: &AppointmentQuery,
        window: Option<PageWindow>,
    ) -> Result<Vec<Appointment>, DbError>;

    async fn count(&self, query: &AppointmentQuery) -> Result<u64, DbError>;

    async fn count_by_status(&self) -> Result<Vec<(AppointmentStatus, u64)>, DbError>;

    async fn count_by_type(&self) -> Result<Vec<(AppointmentType, u64)>, DbError>;
}

/// Cadastro externo de pacientes e médicos
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    async fn patient_exists(&self, id: Uuid) -> Result<bool, DbError>;

    async fn doctor_exists(&self, id: Uuid) -> Result<bool, DbError>;

    async fn find_patient(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError>;

    async fn find_doctor(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError>;
}

#[async_trait]
impl AppointmentRepository for AppointmentStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, DbError> {
        AppointmentStore::find_by_id(self, id).await
    }

    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError> {
        AppointmentStore::find_active_in_slot(self, slot, exclude).await
    }

    async fn insert(&self, appointment: &Appointment) -> Result<(), DbError> {
        AppointmentStore::insert(self, appointment).await
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), DbError> {
        AppointmentStore::update(self, appointment).await
    }

    async fn list(
        &self,
        query: &AppointmentQuery,
        window: Option<PageWindow>,
    ) -> Result<Vec<Appointment>, DbError> {
        AppointmentStore::list(self, query, window).await
    }

    async fn count(&self, query: &AppointmentQuery) -> Result<u64, DbError> {
        AppointmentStore::count(self, query).await
    }

    async fn count_by_status(&self) -> Result<Vec<(AppointmentStatus, u64)>, DbError> {
        AppointmentStore::count_by_status(self).await
    }

    async fn count_by_type(&self) -> Result<Vec<(AppointmentType, u64)>, DbError> {
        AppointmentStore::count_by_type(self).await
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn patient_exists(&self, id: Uuid) -> Result<bool, DbError> {
        SqliteDirectory::patient_exists(self, id).await
    }

    async fn doctor_exists(&self, id: Uuid) -> Result<bool, DbError> {
        SqliteDirectory::doctor_exists(self, id).await
    }

    async fn find_patient(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError> {
        SqliteDirectory::find_patient(self, id).await
    }

    async fn find_doctor(&self, id: Uuid) -> Result<Option<PersonSummary>, DbError> {
        SqliteDirectory::find_doctor(self, id).await
    }
}
