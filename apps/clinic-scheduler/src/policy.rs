//! Regras de negócio do agendamento
//!
//! Concentra a política de transição de status e as validações de campo
//! que valem para qualquer origem (API ou uso como biblioteca).

use common_db::models::AppointmentStatus;

use crate::error::SchedulerError;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const MAX_DURATION_MINUTES: i32 = 480;

/// Política única de transição de status.
///
/// Nenhuma transição é bloqueada hoje, nem a partir de estados terminais
/// (`completed -> scheduled`, cancelar um `completed` etc.). Endurecer o
/// fluxo significa mudar somente esta função. A volta para um status que
/// ocupa horário continua sujeita à verificação de conflito.
pub fn can_transition(_from: AppointmentStatus, _to: AppointmentStatus) -> bool {
    true
}

pub fn ensure_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), SchedulerError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(SchedulerError::Validation(format!(
            "Transição de status não permitida: {} -> {}",
            from, to
        )))
    }
}

/// Se a mudança de status faz o agendamento voltar a ocupar o horário
pub fn reoccupies_slot(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    !from.occupies_slot() && to.occupies_slot()
}

pub fn validate_reason(reason: &str) -> Result<(), SchedulerError> {
    if reason.trim().is_empty() {
        return Err(SchedulerError::Validation(
            "O motivo da consulta é obrigatório".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_duration(minutes: i32) -> Result<(), SchedulerError> {
    if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(SchedulerError::Validation(format!(
            "Duração deve estar entre 1 e {} minutos",
            MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}
