//! Corpos de requisição e parâmetros de consulta da API

use chrono::NaiveDate;
use common_db::models::{AppointmentStatus, AppointmentType, CancelledBy, Priority, SlotTime};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::api::error::ApiError;
use crate::scheduler::{AppointmentPatch, ListFilter, NewAppointment};

/// `POST /api/appointments`
///
/// Horário fora de `HH:MM` falha já na desserialização.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: SlotTime,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<i32>,
    pub priority: Option<Priority>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub rescheduled_from: Option<Uuid>,
}

impl From<CreateAppointmentRequest> for NewAppointment {
    fn from(body: CreateAppointmentRequest) -> Self {
        NewAppointment {
            patient_id: body.patient_id,
            doctor_id: body.doctor_id,
            date: body.date,
            time: body.time,
            appointment_type: body.appointment_type,
            reason: body.reason,
            duration_minutes: body.duration_minutes,
            priority: body.priority,
            notes: body.notes,
            symptoms: body.symptoms,
            rescheduled_from: body.rescheduled_from,
        }
    }
}

/// `PUT /api/appointments/:id`
///
/// `date`, `time` e `doctorId` são lidos só para serem recusados: mudança
/// de horário é feita pela remarcação.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    #[validate(length(min = 1, max = 500))]
    pub reason: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<AppointmentStatus>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub date: Option<serde_json::Value>,
    pub time: Option<serde_json::Value>,
    pub doctor_id: Option<serde_json::Value>,
}

impl UpdateAppointmentRequest {
    pub fn into_patch(self) -> Result<AppointmentPatch, ApiError> {
        let slot_fields: Vec<&str> = [
            ("date", self.date.is_some()),
            ("time", self.time.is_some()),
            ("doctorId", self.doctor_id.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();

        if !slot_fields.is_empty() {
            return Err(ApiError::Validation(format!(
                "Campos de horário ({}) só podem ser alterados via /reschedule",
                slot_fields.join(", ")
            )));
        }

        Ok(AppointmentPatch {
            appointment_type: self.appointment_type,
            reason: self.reason,
            priority: self.priority,
            status: self.status,
            duration_minutes: self.duration_minutes,
            notes: self.notes,
            symptoms: self.symptoms,
        })
    }
}

/// `PATCH /api/appointments/:id/cancel`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentRequest {
    pub cancelled_by: CancelledBy,
    #[validate(length(max = 500))]
    pub cancellation_reason: Option<String>,
}

/// `PATCH /api/appointments/:id/reschedule`
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    pub time: SlotTime,
}

/// Query string de `GET /api/appointments`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppointmentsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

impl From<ListAppointmentsParams> for ListFilter {
    fn from(params: ListAppointmentsParams) -> Self {
        ListFilter {
            date: params.date,
            start_date: params.start_date,
            end_date: params.end_date,
            doctor_id: params.doctor_id,
            patient_id: params.patient_id,
            status: params.status,
            page: params.page,
            limit: params.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_validation() {
        let request: CreateAppointmentRequest = serde_json::from_value(json!({
            "patientId": Uuid::new_v4(),
            "doctorId": Uuid::new_v4(),
            "date": "2025-01-10",
            "time": "10:00",
            "type": "consultation",
            "reason": ""
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("reason"));
    }

    #[test]
    fn test_malformed_time_fails_deserialization() {
        for time in ["25:00", "7pm", "10h30"] {
            let body = json!({
                "patientId": Uuid::new_v4(),
                "doctorId": Uuid::new_v4(),
                "date": "2025-01-10",
                "time": time,
                "type": "consultation",
                "reason": "Retorno"
            });
            assert!(serde_json::from_value::<CreateAppointmentRequest>(body).is_err(), "{}", time);
        }

        let reschedule =
            serde_json::from_value::<RescheduleAppointmentRequest>(json!({ "date": "2025-01-10", "time": "24:00" }));
        assert!(reschedule.is_err());
    }

    #[test]
    fn test_create_request_conversion_normalizes_time() {
        let request: CreateAppointmentRequest = serde_json::from_value(json!({
            "patientId": Uuid::new_v4(),
            "doctorId": Uuid::new_v4(),
            "date": "2025-01-10",
            "time": "9:30",
            "type": "follow-up",
            "reason": "Retorno pós-cirúrgico",
            "priority": "high",
            "symptoms": ["dor"]
        }))
        .unwrap();
        assert!(request.validate().is_ok());

        let new = NewAppointment::from(request);
        assert_eq!(new.time.to_string(), "09:30");
        assert_eq!(new.appointment_type, AppointmentType::FollowUp);
        assert_eq!(new.priority, Some(Priority::High));
        assert_eq!(new.duration_minutes, None);
    }

    #[test]
    fn test_update_rejects_slot_fields() {
        let request: UpdateAppointmentRequest = serde_json::from_value(json!({
            "notes": "ok",
            "date": "2025-02-01",
            "doctorId": Uuid::new_v4()
        }))
        .unwrap();

        match request.into_patch() {
            Err(ApiError::Validation(message)) => {
                assert!(message.contains("date"));
                assert!(message.contains("doctorId"));
            }
            other => panic!("esperava erro de validação, veio {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_update_status_patch() {
        let request: UpdateAppointmentRequest =
            serde_json::from_value(json!({ "status": "in-progress", "date": null })).unwrap();
        let patch = request.into_patch().unwrap();
        assert_eq!(patch.status, Some(AppointmentStatus::InProgress));
        assert_eq!(patch.reason, None);
    }

    #[test]
    fn test_list_params_map_to_filter() {
        let params = ListAppointmentsParams {
            page: Some(2),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
            status: Some(AppointmentStatus::NoShow),
            ..ListAppointmentsParams::default()
        };
        let filter = ListFilter::from(params);
        assert_eq!(filter.page, Some(2));
        assert_eq!(filter.limit, None);
        assert_eq!(filter.status, Some(AppointmentStatus::NoShow));
    }
}
