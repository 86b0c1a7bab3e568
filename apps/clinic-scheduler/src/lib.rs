//! Clinic Scheduler - Agendamento de consultas de uma clínica
//!
//! Mantém a agenda de consultas entre pacientes e médicos, garantindo que
//! nenhum médico tenha dois agendamentos ativos no mesmo horário.

pub mod api;
pub mod config;
pub mod error;
pub mod policy;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use error::{Entity, SchedulerError};
pub use scheduler::Scheduler;

/// Metadados gerados em tempo de compilação
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
