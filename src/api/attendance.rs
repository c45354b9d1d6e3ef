use crate::attendance::resolver::{AttendanceResolver, RejectReason};
use actix_web::{HttpResponse, Responder, ResponseError, http::StatusCode, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ScanRequest {
    #[schema(example = "3")]
    pub fingerprint: String,
}

impl ResponseError for RejectReason {
    fn status_code(&self) -> StatusCode {
        match self {
            RejectReason::SubjectNotFound => StatusCode::NOT_FOUND,
            RejectReason::SubjectNotEligible => StatusCode::FORBIDDEN,
            RejectReason::AlreadyCheckedOutToday | RejectReason::ConcurrentScan => {
                StatusCode::CONFLICT
            }
            RejectReason::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            RejectReason::SubjectNotFound => "User tidak ditemukan",
            RejectReason::SubjectNotEligible => "User bukan mahasiswa",
            RejectReason::AlreadyCheckedOutToday => "Anda sudah checkout hari ini",
            RejectReason::ConcurrentScan => "Scan bersamaan terdeteksi, silakan scan ulang",
            RejectReason::StoreUnavailable(e) => {
                error!(error = %e, "Attendance store unavailable");
                "Layanan absensi tidak tersedia"
            }
        };

        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

/// Record a fingerprint scan
///
/// The direction is decided from the student's latest event: first scan of
/// the day checks in, the second checks out, a third is refused.
#[utoipa::path(
    post,
    path = "/api/esp/attendances",
    request_body = ScanRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = Object, example = json!({
            "message": "Absensi berhasil dibuat",
            "data": {
                "id": 42,
                "subject_id": "2201010001",
                "direction": "check_in",
                "occurred_at": "2026-10-19T01:05:00Z"
            }
        })),
        (status = 400, description = "Fingerprint missing"),
        (status = 403, description = "Not a student", body = Object, example = json!({
            "message": "User bukan mahasiswa"
        })),
        (status = 404, description = "Unknown fingerprint or no NIM", body = Object, example = json!({
            "message": "User tidak ditemukan"
        })),
        (status = 409, description = "Already checked out today, or a concurrent scan won", body = Object, example = json!({
            "message": "Anda sudah checkout hari ini"
        })),
        (status = 429, description = "Too many requests"),
        (status = 503, description = "Attendance store unavailable")
    ),
    tag = "Attendance"
)]
pub async fn scan(
    resolver: web::Data<AttendanceResolver>,
    payload: web::Json<ScanRequest>,
) -> Result<impl Responder, RejectReason> {
    let fingerprint = payload.fingerprint.trim();
    if fingerprint.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "fingerprint is required"
        })));
    }

    let event = resolver.submit_scan(fingerprint).await?;
    info!(event_id = event.id, direction = %event.direction, "Scan accepted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Absensi berhasil dibuat",
        "data": event
    })))
}
