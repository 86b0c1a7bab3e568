//! Erros do agendador de consultas

use common_db::models::Slot;
use common_db::DbError;
use std::fmt;
use thiserror::Error;

/// Entidade referenciada por uma operação
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Patient,
    Doctor,
    Appointment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Patient => f.write_str("Paciente"),
            Entity::Doctor => f.write_str("Médico"),
            Entity::Appointment => f.write_str("Agendamento"),
        }
    }
}

/// Falhas das operações do agendador
///
/// Nenhuma operação grava parcialmente: qualquer erro aborta a operação
/// inteira.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("{0} não encontrado")]
    NotFound(Entity),

    #[error("Horário já reservado: {0}")]
    Conflict(Slot),

    #[error("Dados inválidos: {0}")]
    Validation(String),

    #[error("Falha de armazenamento: {0}")]
    Storage(#[from] DbError),
}

impl SchedulerError {
    /// Traduz a violação do índice de horário ativo em conflito
    pub(crate) fn from_slot_write(error: DbError, slot: Slot) -> Self {
        if error.is_constraint_violation() {
            SchedulerError::Conflict(slot)
        } else {
            SchedulerError::Storage(error)
        }
    }
}
