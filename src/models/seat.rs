use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Статус места в инвентаре. Хранится в БД как TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Reserved,
    Sold,
    Blocked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Reserved => "RESERVED",
            SeatStatus::Sold => "SOLD",
            SeatStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(SeatStatus::Available),
            "RESERVED" => Some(SeatStatus::Reserved),
            "SOLD" => Some(SeatStatus::Sold),
            "BLOCKED" => Some(SeatStatus::Blocked),
            _ => None,
        }
    }
}

/// Строка инвентаря: место конкретного показа конкретного события.
/// Уникальный ключ — (event_id, showtime, seat_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSeat {
    pub event_id: String,
    pub showtime: DateTime<Utc>,
    pub seat_id: String,
    pub zone: Option<String>,
    pub price: Option<f64>,
    pub status: SeatStatus,
    pub booking_id: Option<String>,
    pub sold_at: Option<DateTime<Utc>>,
}

impl EventSeat {
    /// Свободное место, каким его заводит административная загрузка инвентаря.
    pub fn available(event_id: &str, showtime: DateTime<Utc>, seat_id: &str) -> Self {
        EventSeat {
            event_id: event_id.to_string(),
            showtime,
            seat_id: seat_id.to_string(),
            zone: None,
            price: None,
            status: SeatStatus::Available,
            booking_id: None,
            sold_at: None,
        }
    }
}
