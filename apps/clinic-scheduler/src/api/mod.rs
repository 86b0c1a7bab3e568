//! API REST do agendador
//!
//! Rotas sob `/api`, mais `/health` na raiz.
//!
//! Pilha de middleware (externa → interna):
//! trace → compressão → CORS → limite de concorrência → handler

use std::sync::Arc;

use axum::routing::{get, patch};
use axum::Router;
use common_db::{AppointmentStore, EncryptionKey, SqliteDirectory};
use sqlx::SqlitePool;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::scheduler::Scheduler;

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;

/// Agendador concreto usado pelo serviço
pub type ClinicScheduler = Scheduler<AppointmentStore, SqliteDirectory>;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<ClinicScheduler>,
}

impl AppState {
    pub fn new(pool: SqlitePool, key: EncryptionKey) -> Self {
        let store = AppointmentStore::new(pool.clone(), key);
        let directory = SqliteDirectory::new(pool);
        Self {
            scheduler: Arc::new(Scheduler::new(store, directory)),
        }
    }
}

/// Monta o router completo com middleware
pub fn router(state: AppState, max_concurrent_requests: usize) -> Router {
    let appointments = Router::new()
        .route("/appointments", get(handlers::list).post(handlers::create))
        .route("/appointments/today/list", get(handlers::today))
        .route("/appointments/stats/overview", get(handlers::stats))
        .route(
            "/appointments/:id",
            get(handlers::detail).put(handlers::update),
        )
        .route("/appointments/:id/cancel", patch(handlers::cancel))
        .route("/appointments/:id/reschedule", patch(handlers::reschedule));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", appointments)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive())
                .layer(ConcurrencyLimitLayer::new(max_concurrent_requests)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use common_db::models::PersonSummary;
    use common_db::{init_db_pool, DbConfig};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::scheduler::today;

    struct TestApp {
        _dir: TempDir,
        router: Router,
        patient: PersonSummary,
        doctor: PersonSummary,
    }

    async fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig {
            db_path: dir.path().join("api.db").to_string_lossy().into_owned(),
            key_phrase: "test_password".to_string(),
            max_connections: 2,
        };
        let pool = init_db_pool(&config).await.unwrap();
        let state = AppState::new(pool, EncryptionKey::generate());

        let directory = state.scheduler.directory();
        let patient = directory.register_patient("João Almeida").await.unwrap();
        let doctor = directory
            .register_doctor("Dra. Beatriz Rocha", Some("Dermatologia"))
            .await
            .unwrap();

        TestApp {
            _dir: dir,
            router: router(state, 16),
            patient,
            doctor,
        }
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn booking(app: &TestApp, date: &str, time: &str) -> Value {
        json!({
            "patientId": app.patient.id,
            "doctorId": app.doctor.id,
            "date": date,
            "time": time,
            "type": "consultation",
            "reason": "Lesão na pele",
            "notes": "Primeira consulta",
            "symptoms": ["coceira"]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "clinic-scheduler");
        assert_eq!(body["database"], true);
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let app = test_app().await;

        let (status, created) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "10:00"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "scheduled");
        assert_eq!(created["time"], "10:00");
        assert_eq!(created["durationMinutes"], 30);
        assert_eq!(created["notes"], "Primeira consulta");
        assert_eq!(created["patient"]["name"], "João Almeida");
        assert_eq!(created["doctor"]["specialization"], "Dermatologia");

        let (status, error) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "10:00"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "SLOT_CONFLICT");
    }

    #[tokio::test]
    async fn test_create_with_unknown_doctor_is_404() {
        let app = test_app().await;
        let mut body = booking(&app, "2025-01-10", "10:00");
        body["doctorId"] = json!(uuid::Uuid::new_v4());

        let (status, error) = send(&app, "POST", "/api/appointments", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["error"]["message"], "Médico não encontrado");
    }

    #[tokio::test]
    async fn test_create_with_missing_or_malformed_fields_is_400() {
        let app = test_app().await;

        let mut missing_reason = booking(&app, "2025-01-10", "10:00");
        missing_reason.as_object_mut().unwrap().remove("reason");
        let (status, error) = send(&app, "POST", "/api/appointments", Some(missing_reason)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");

        let (status, error) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "7pm"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_unknown_and_malformed_ids() {
        let app = test_app().await;
        let uri = format!("/api/appointments/{}", uuid::Uuid::new_v4());
        let (status, _) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, error) = send(&app, "GET", "/api/appointments/nao-e-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_refuses_slot_fields() {
        let app = test_app().await;
        let (_, created) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "10:00"))).await;
        let uri = format!("/api/appointments/{}", created["id"].as_str().unwrap());

        let (status, error) = send(&app, "PUT", &uri, Some(json!({ "time": "11:00" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");

        let (status, updated) =
            send(&app, "PUT", &uri, Some(json!({ "status": "confirmed", "priority": "high" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "confirmed");
        assert_eq!(updated["priority"], "high");
        assert_eq!(updated["time"], "10:00");
    }

    #[tokio::test]
    async fn test_cancel_and_reschedule_flow() {
        let app = test_app().await;
        let (_, a) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "10:00"))).await;
        let (_, b) =
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", "11:00"))).await;
        let a_id = a["id"].as_str().unwrap().to_string();
        let b_id = b["id"].as_str().unwrap().to_string();

        let (status, error) = send(
            &app,
            "PATCH",
            &format!("/api/appointments/{}/reschedule", b_id),
            Some(json!({ "date": "2025-01-10", "time": "10:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"]["code"], "SLOT_CONFLICT");

        let (status, cancelled) = send(
            &app,
            "PATCH",
            &format!("/api/appointments/{}/cancel", a_id),
            Some(json!({ "cancelledBy": "doctor", "cancellationReason": "Congresso" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");
        assert_eq!(cancelled["cancelledBy"], "doctor");

        let (status, moved) = send(
            &app,
            "PATCH",
            &format!("/api/appointments/{}/reschedule", b_id),
            Some(json!({ "date": "2025-01-10", "time": "10:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["id"], b_id.as_str());
        assert_eq!(moved["time"], "10:00");

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/appointments/{}/cancel", uuid::Uuid::new_v4()),
            Some(json!({ "cancelledBy": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_pagination_shape() {
        let app = test_app().await;
        for hour in 8..20 {
            let time = format!("{:02}:00", hour);
            send(&app, "POST", "/api/appointments", Some(booking(&app, "2025-01-10", &time))).await;
        }

        let uri = format!(
            "/api/appointments?doctorId={}&page=2&limit=5",
            app.doctor.id
        );
        let (status, page) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 12);
        assert_eq!(page["totalPages"], 3);
        assert_eq!(page["currentPage"], 2);
        assert_eq!(page["appointments"].as_array().unwrap().len(), 5);
        assert_eq!(page["appointments"][0]["time"], "13:00");

        let (status, _) = send(&app, "GET", "/api/appointments?page=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/appointments?status=unknown", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_today_and_stats() {
        let app = test_app().await;
        let day = today();
        let tomorrow = day + Duration::days(1);

        send(&app, "POST", "/api/appointments", Some(booking(&app, &day.to_string(), "14:00"))).await;
        send(&app, "POST", "/api/appointments", Some(booking(&app, &day.to_string(), "09:00"))).await;
        send(&app, "POST", "/api/appointments", Some(booking(&app, &tomorrow.to_string(), "09:00"))).await;

        let (status, list) = send(&app, "GET", "/api/appointments/today/list", None).await;
        assert_eq!(status, StatusCode::OK);
        let times: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["time"].as_str().unwrap())
            .collect();
        assert_eq!(times, vec!["09:00", "14:00"]);

        let (status, stats) = send(&app, "GET", "/api/appointments/stats/overview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["today"], 2);
        assert_eq!(stats["byStatus"]["scheduled"], 3);
        assert_eq!(stats["byStatus"]["cancelled"], 0);
        assert_eq!(stats["byType"]["consultation"], 3);
    }
}
