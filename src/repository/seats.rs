//! seats.rs
//!
//! Postgres-реализация репозитория инвентаря.
//!
//! Наборы идентификаторов мест передаются драйверу как нативные массивы
//! Postgres (`seat_id = ANY($n)`), а не как склейка строк: условие по
//! массиву попадает в составной индекс (event_id, showtime).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use super::{RepositoryError, SeatRepository};
use crate::models::SeatStatus;

type PgTx = Transaction<'static, Postgres>;

pub struct PgSeatRepository {
    // Совместимость со схемой без инвентаря: см. FeatureFlags.
    legacy_seat_fallback: bool,
}

impl PgSeatRepository {
    pub fn new(legacy_seat_fallback: bool) -> Self {
        Self {
            legacy_seat_fallback,
        }
    }
}

#[async_trait]
impl SeatRepository<PgTx> for PgSeatRepository {
    async fn validate_seats_exist(
        &self,
        tx: &mut PgTx,
        event_id: &str,
        showtime: DateTime<Utc>,
        requested: &[String],
    ) -> Result<Vec<String>, RepositoryError> {
        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT seat_id FROM event_seats
             WHERE event_id = $1 AND showtime = $2 AND seat_id = ANY($3)",
        )
        .bind(event_id)
        .bind(showtime)
        .bind(requested)
        .fetch_all(&mut **tx)
        .await?;

        let missing: Vec<String> = requested
            .iter()
            .filter(|seat| !existing.contains(seat))
            .cloned()
            .collect();

        // Легаси-режим: инвентарь для этого показа не заведён вовсе -
        // считаем, что все места существуют.
        if !missing.is_empty() && self.legacy_seat_fallback {
            let provisioned: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM event_seats WHERE event_id = $1 AND showtime = $2",
            )
            .bind(event_id)
            .bind(showtime)
            .fetch_one(&mut **tx)
            .await?;

            if provisioned == 0 {
                return Ok(Vec::new());
            }
        }

        Ok(missing)
    }

    async fn check_availability(
        &self,
        tx: &mut PgTx,
        event_id: &str,
        showtime: DateTime<Utc>,
        requested: &[String],
    ) -> Result<Vec<String>, RepositoryError> {
        let taken: Vec<String> = sqlx::query_scalar(
            "SELECT seat_id FROM event_seats
             WHERE event_id = $1 AND showtime = $2 AND seat_id = ANY($3)
               AND status IN ('RESERVED', 'SOLD')",
        )
        .bind(event_id)
        .bind(showtime)
        .bind(requested)
        .fetch_all(&mut **tx)
        .await?;

        Ok(taken)
    }

    async fn update_seats_status(
        &self,
        tx: &mut PgTx,
        event_id: &str,
        showtime: DateTime<Utc>,
        seat_ids: &[String],
        booking_id: &str,
        target: SeatStatus,
    ) -> Result<(), RepositoryError> {
        // SOLD и RESERVED - два отдельных запроса: CASE по статусу ломает
        // вывод типов параметров у драйвера.
        let result = match target {
            SeatStatus::Sold => {
                sqlx::query(
                    "UPDATE event_seats
                     SET status = 'SOLD', booking_id = $1, sold_at = NOW(), updated_at = NOW()
                     WHERE event_id = $2 AND showtime = $3 AND seat_id = ANY($4)
                       AND status = 'AVAILABLE'",
                )
                .bind(booking_id)
                .bind(event_id)
                .bind(showtime)
                .bind(seat_ids)
                .execute(&mut **tx)
                .await?
            }
            SeatStatus::Reserved => {
                sqlx::query(
                    "UPDATE event_seats
                     SET status = 'RESERVED', booking_id = $1, reserved_at = NOW(), updated_at = NOW()
                     WHERE event_id = $2 AND showtime = $3 AND seat_id = ANY($4)
                       AND status = 'AVAILABLE'",
                )
                .bind(booking_id)
                .bind(event_id)
                .bind(showtime)
                .bind(seat_ids)
                .execute(&mut **tx)
                .await?
            }
            other => return Err(RepositoryError::InvalidTargetStatus(other.as_str())),
        };

        if result.rows_affected() != seat_ids.len() as u64 {
            // В легаси-режиме незаведённый инвентарь не переходит по
            // статусам вовсе - бронирование живёт без него.
            if self.legacy_seat_fallback {
                let provisioned: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM event_seats WHERE event_id = $1 AND showtime = $2",
                )
                .bind(event_id)
                .bind(showtime)
                .fetch_one(&mut **tx)
                .await?;

                if provisioned == 0 {
                    return Ok(());
                }
            }

            return Err(RepositoryError::SeatCountMismatch {
                expected: seat_ids.len(),
                actual: result.rows_affected(),
            });
        }

        Ok(())
    }

    async fn release_booking_seats(
        &self,
        tx: &mut PgTx,
        booking_id: &str,
    ) -> Result<Vec<String>, RepositoryError> {
        let freed: Vec<String> = sqlx::query_scalar(
            "UPDATE event_seats
             SET status = 'AVAILABLE', booking_id = NULL,
                 reserved_at = NULL, reserved_until = NULL, sold_at = NULL,
                 updated_at = NOW()
             WHERE booking_id = $1 AND status IN ('RESERVED', 'SOLD')
             RETURNING seat_id",
        )
        .bind(booking_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(freed)
    }
}
