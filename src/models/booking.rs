use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Статус бронирования. Хранится в БД как TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Заголовок бронирования вместе со списком мест.
///
/// `booking_id` — внешний идентификатор вида `BK-<uuid>`; суррогатный
/// автоинкрементный id остаётся внутри БД и наружу не отдаётся.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: String,
    pub event_id: String,
    pub user_id: String,
    pub showtime: DateTime<Utc>,
    pub quantity: i32,
    pub seat_ids: Vec<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_confirmed(
        event_id: &str,
        user_id: &str,
        showtime: DateTime<Utc>,
        seat_ids: Vec<String>,
    ) -> Self {
        Booking {
            booking_id: generate_booking_id(),
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            showtime,
            quantity: seat_ids.len() as i32,
            seat_ids,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        }
    }
}

pub fn generate_booking_id() -> String {
    format!("BK-{}", Uuid::new_v4())
}
