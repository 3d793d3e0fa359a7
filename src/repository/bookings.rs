//! bookings.rs
//!
//! Postgres-реализация репозитория бронирований.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use super::{BookingRepository, RepositoryError};
use crate::models::{Booking, BookingStatus};

type PgTx = Transaction<'static, Postgres>;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<BookingStatus, RepositoryError> {
    BookingStatus::parse(raw).ok_or_else(|| RepositoryError::UnknownStatus(raw.to_string()))
}

#[async_trait]
impl BookingRepository<PgTx> for PgBookingRepository {
    async fn create_booking(
        &self,
        tx: &mut PgTx,
        booking: &Booking,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO bookings (booking_id, event_id, user_id, showtime, quantity, status)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&booking.booking_id)
        .bind(&booking.event_id)
        .bind(&booking.user_id)
        .bind(booking.showtime)
        .bind(booking.quantity)
        .bind(booking.status.as_str())
        .execute(&mut **tx)
        .await?;

        // Дочерние строки одним запросом через массив.
        sqlx::query(
            "INSERT INTO booking_seats (booking_id, seat_id)
             SELECT $1, unnest($2::text[])",
        )
        .bind(&booking.booking_id)
        .bind(&booking.seat_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, booking_id: &str) -> Result<Option<Booking>, RepositoryError> {
        let header = sqlx::query(
            "SELECT booking_id, event_id, user_id, showtime, quantity, status, created_at
             FROM bookings WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = header else {
            return Ok(None);
        };

        let seat_ids: Vec<String> = sqlx::query_scalar(
            "SELECT seat_id FROM booking_seats WHERE booking_id = $1 ORDER BY seat_id",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        let status: String = row.get("status");
        Ok(Some(Booking {
            booking_id: row.get("booking_id"),
            event_id: row.get("event_id"),
            user_id: row.get("user_id"),
            showtime: row.get::<DateTime<Utc>, _>("showtime"),
            quantity: row.get("quantity"),
            seat_ids,
            status: parse_status(&status)?,
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        }))
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, RepositoryError> {
        // Заголовки и места одним JOIN, затем группировка в памяти.
        let rows = sqlx::query(
            "SELECT b.booking_id, b.event_id, b.user_id, b.showtime, b.quantity,
                    b.status, b.created_at, bs.seat_id
             FROM bookings b
             LEFT JOIN booking_seats bs ON bs.booking_id = b.booking_id
             WHERE b.user_id = $1
             ORDER BY b.created_at DESC, bs.seat_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut bookings: Vec<Booking> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in rows {
            let booking_id: String = row.get("booking_id");
            let seat_id: Option<String> = row.try_get("seat_id").ok();

            let i = match index.get(&booking_id) {
                Some(&i) => i,
                None => {
                    let status: String = row.get("status");
                    bookings.push(Booking {
                        booking_id: booking_id.clone(),
                        event_id: row.get("event_id"),
                        user_id: row.get("user_id"),
                        showtime: row.get::<DateTime<Utc>, _>("showtime"),
                        quantity: row.get("quantity"),
                        seat_ids: Vec::new(),
                        status: parse_status(&status)?,
                        created_at: row.get::<DateTime<Utc>, _>("created_at"),
                    });
                    index.insert(booking_id, bookings.len() - 1);
                    bookings.len() - 1
                }
            };

            if let Some(seat_id) = seat_id {
                bookings[i].seat_ids.push(seat_id);
            }
        }

        Ok(bookings)
    }

    async fn set_status(
        &self,
        tx: &mut PgTx,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE bookings SET status = $2, updated_at = NOW() WHERE booking_id = $1")
            .bind(booking_id)
            .bind(status.as_str())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
