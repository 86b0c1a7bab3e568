//! Handlers HTTP do agendador

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::dto::{
    CancelAppointmentRequest, CreateAppointmentRequest, ListAppointmentsParams,
    RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::api::error::ApiError;
use crate::api::extract::ValidatedJson;
use crate::api::AppState;
use crate::built_info;
use crate::scheduler::{AppointmentDetails, AppointmentPage, OverviewStats};

type ApiResult<T> = Result<T, ApiError>;

/// `GET /api/appointments`
pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListAppointmentsParams>, QueryRejection>,
) -> ApiResult<Json<AppointmentPage>> {
    let Query(params) = params?;
    let page = state.scheduler.list_appointments(params.into()).await?;
    Ok(Json(page))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<AppointmentDetails>> {
    let Path(id) = id?;
    Ok(Json(state.scheduler.get_appointment(id).await?))
}

/// `POST /api/appointments`
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<AppointmentDetails>)> {
    let created = state.scheduler.create_appointment(body.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /api/appointments/:id`
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<UpdateAppointmentRequest>,
) -> ApiResult<Json<AppointmentDetails>> {
    let Path(id) = id?;
    let patch = body.into_patch()?;
    Ok(Json(state.scheduler.update_appointment(id, patch).await?))
}

/// `PATCH /api/appointments/:id/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<CancelAppointmentRequest>,
) -> ApiResult<Json<AppointmentDetails>> {
    let Path(id) = id?;
    let cancelled = state
        .scheduler
        .cancel_appointment(id, body.cancelled_by, body.cancellation_reason)
        .await?;
    Ok(Json(cancelled))
}

/// `PATCH /api/appointments/:id/reschedule`
pub async fn reschedule(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    ValidatedJson(body): ValidatedJson<RescheduleAppointmentRequest>,
) -> ApiResult<Json<AppointmentDetails>> {
    let Path(id) = id?;
    let moved = state
        .scheduler
        .reschedule_appointment(id, body.date, body.time)
        .await?;
    Ok(Json(moved))
}

/// `GET /api/appointments/today/list`
pub async fn today(State(state): State<AppState>) -> ApiResult<Json<Vec<AppointmentDetails>>> {
    Ok(Json(state.scheduler.list_todays_appointments().await?))
}

/// `GET /api/appointments/stats/overview`
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<OverviewStats>> {
    Ok(Json(state.scheduler.get_overview_stats().await?))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.scheduler.repository().pool())
        .await
        .is_ok();

    let (status, label) = if database {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!("Health check sem acesso ao banco");
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(HealthResponse {
            status: label,
            service: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            database,
        }),
    )
}
