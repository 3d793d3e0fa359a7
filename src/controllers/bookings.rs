//! bookings.rs
//!
//! Граница HTTP для бронирований.
//!
//! Обязанности: десериализация запросов (включая гибкие временные метки),
//! вызов координатора и перевод его ошибок в категории ответов. Вся логика
//! бронирования живёт в `services::booking`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::{Booking, BookingStatus, FlexTimestamp};
use crate::services::{BookingError, BookingRequest};
use crate::AppState;

/// Определяет маршруты, связанные с бронированиями.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/bookings", post(submit_booking).get(list_bookings))
        .route("/v1/bookings/{booking_id}", get(get_booking))
        .route("/v1/bookings/{booking_id}/cancel", patch(cancel_booking))
}

// --- DTO ---

/// POST /api/v1/bookings
///
/// Отсутствующие поля десериализуются в пустые значения и отбрасываются
/// валидацией первого шага координатора.
#[derive(Debug, Deserialize)]
struct SubmitBookingRequest {
    #[serde(rename = "eventId", default)]
    event_id: String,
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(default)]
    showtime: FlexTimestamp,
    #[serde(default)]
    quantity: i32,
    #[serde(rename = "seatIds", default)]
    seat_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BookingData {
    #[serde(rename = "bookingId")]
    booking_id: String,
    #[serde(rename = "eventId")]
    event_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    /// Всегда RFC3339 в UTC, независимо от формата во входном запросе.
    showtime: FlexTimestamp,
    quantity: i32,
    #[serde(rename = "seatIds")]
    seat_ids: Vec<String>,
    status: BookingStatus,
}

impl From<Booking> for BookingData {
    fn from(b: Booking) -> Self {
        BookingData {
            booking_id: b.booking_id,
            event_id: b.event_id,
            user_id: b.user_id,
            showtime: FlexTimestamp(b.showtime),
            quantity: b.quantity,
            seat_ids: b.seat_ids,
            status: b.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    #[serde(rename = "userId", default)]
    user_id: String,
}

// --- Отображение ошибок координатора в категории ответов ---

fn error_response(err: BookingError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        BookingError::InvalidRequest(_)
        | BookingError::ShowtimeInvalid
        | BookingError::SeatsMissing(_)
        | BookingError::SeatsTaken(_) => StatusCode::BAD_REQUEST,
        BookingError::EventNotFound | BookingError::BookingNotFound => StatusCode::NOT_FOUND,
        BookingError::Conflict => StatusCode::CONFLICT,
        BookingError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        BookingError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({
        "success": false,
        // Внутренности 500-х наружу не отдаём, детали уже в логе.
        "error": match &err {
            BookingError::Fatal(_) => "internal error".to_string(),
            other => other.to_string(),
        },
    });

    // Для ошибок по местам клиенту нужен список виновников.
    if let BookingError::SeatsMissing(seats) | BookingError::SeatsTaken(seats) = &err {
        body["seats"] = json!(seats);
    }

    (status, Json(body))
}

fn success_body(booking: Booking) -> Json<Value> {
    Json(json!({"success": true, "data": BookingData::from(booking)}))
}

// --- Обработчики ---

/// POST /api/v1/bookings
async fn submit_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let request = BookingRequest {
        event_id: req.event_id,
        user_id: req.user_id,
        showtime: req.showtime.into_utc(),
        quantity: req.quantity,
        seat_ids: req.seat_ids,
    };

    let booking = state
        .coordinator
        .book_tickets(request)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, success_body(booking)))
}

/// GET /api/v1/bookings/{booking_id}
async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let booking = state
        .coordinator
        .get_booking(&booking_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, success_body(booking)))
}

/// GET /api/v1/bookings?userId=...
async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let user_id = params.user_id.filter(|u| !u.is_empty()).ok_or_else(|| {
        error_response(BookingError::InvalidRequest("userId is required".into()))
    })?;

    let bookings = state
        .coordinator
        .list_user_bookings(&user_id)
        .await
        .map_err(error_response)?;

    let data: Vec<BookingData> = bookings.into_iter().map(BookingData::from).collect();
    Ok((StatusCode::OK, Json(json!({"success": true, "data": data}))))
}

/// PATCH /api/v1/bookings/{booking_id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    if req.user_id.is_empty() {
        return Err(error_response(BookingError::InvalidRequest(
            "userId is required".into(),
        )));
    }

    let booking = state
        .coordinator
        .cancel_booking(&booking_id, &req.user_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, success_body(booking)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_400() {
        for err in [
            BookingError::InvalidRequest("x".into()),
            BookingError::ShowtimeInvalid,
            BookingError::SeatsMissing(vec!["Z9".into()]),
            BookingError::SeatsTaken(vec!["A1".into()]),
        ] {
            let (status, _) = error_response(err);
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn lock_conflict_maps_to_409() {
        let (status, _) = error_response(BookingError::Conflict);
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn upstream_and_fatal_map_to_server_errors() {
        let (status, _) = error_response(BookingError::UpstreamUnavailable("down".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = error_response(BookingError::Fatal("pool exhausted".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        // Текст внутренней ошибки не должен утекать в ответ.
        assert_eq!(body.0["error"], "internal error");
    }

    #[test]
    fn seat_failures_carry_the_offending_list() {
        let (_, body) = error_response(BookingError::SeatsTaken(vec!["A1".into(), "A3".into()]));
        assert_eq!(body.0["seats"], json!(["A1", "A3"]));
        assert_eq!(body.0["success"], json!(false));
    }

    #[test]
    fn submit_request_tolerates_missing_fields() {
        let req: SubmitBookingRequest = serde_json::from_str("{}").unwrap();
        assert!(req.event_id.is_empty());
        assert_eq!(req.quantity, 0);
        assert_eq!(req.showtime.into_utc().timestamp(), 0);
    }

    #[test]
    fn submit_request_parses_flexible_showtime() {
        let req: SubmitBookingRequest = serde_json::from_str(
            r#"{"eventId":"1","userId":"u","showtime":"2025-12-25T19:00:00Z","quantity":2,"seatIds":["A1","A2"]}"#,
        )
        .unwrap();
        assert_eq!(req.seat_ids, vec!["A1", "A2"]);
        assert_eq!(req.showtime.to_string(), "2025-12-25T19:00:00Z");
    }
}
