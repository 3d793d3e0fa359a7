//! mod.rs
//!
//! Слой доступа к данным.
//!
//! Репозитории объявлены как узкие трейты, параметризованные типом
//! транзакции: координатор работает с ними через `Arc<dyn …>`, а тесты
//! подставляют in-memory реализации. Postgres-реализации живут в
//! `seats.rs` и `bookings.rs`.

pub mod bookings;
pub mod seats;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::models::{Booking, BookingStatus, SeatStatus};

pub use bookings::PgBookingRepository;
pub use seats::PgSeatRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Условный UPDATE затронул не все запрошенные места. Признак гонки,
    /// которую должна была исключить блокировка.
    #[error("expected to transition {expected} seats, transitioned {actual}")]
    SeatCountMismatch { expected: usize, actual: u64 },

    #[error("seats can only transition to RESERVED or SOLD, got {0}")]
    InvalidTargetStatus(&'static str),

    #[error("unknown booking status in storage: {0}")]
    UnknownStatus(String),

    /// Произвольная ошибка нереляционной реализации (in-memory фейки).
    #[error("storage error: {0}")]
    Backend(String),
}

/// Управление жизненным циклом транзакции.
///
/// Каждое бронирование открывает ровно одну транзакцию; rollback после
/// commit безопасен и идемпотентен (у sqlx — no-op при уже завершённой).
#[async_trait]
pub trait TxManager: Send + Sync {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), RepositoryError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), RepositoryError>;
}

/// Операции над инвентарём мест. Все — в рамках переданной транзакции.
#[async_trait]
pub trait SeatRepository<Tx>: Send + Sync {
    /// Возвращает подмножество запрошенных мест, которых нет в инвентаре
    /// для пары (event_id, showtime).
    async fn validate_seats_exist(
        &self,
        tx: &mut Tx,
        event_id: &str,
        showtime: DateTime<Utc>,
        requested: &[String],
    ) -> Result<Vec<String>, RepositoryError>;

    /// Возвращает подмножество запрошенных мест со статусом RESERVED или
    /// SOLD. Смотрит напрямую в инвентарь, минуя bookings: переходы,
    /// сделанные ранее в этой же транзакции, должны быть видны.
    async fn check_availability(
        &self,
        tx: &mut Tx,
        event_id: &str,
        showtime: DateTime<Utc>,
        requested: &[String],
    ) -> Result<Vec<String>, RepositoryError>;

    /// Переводит места из AVAILABLE в `target`, проставляя booking_id.
    /// Если затронуто меньше строк, чем запрошено мест, операция обязана
    /// вернуть ошибку и привести к откату.
    async fn update_seats_status(
        &self,
        tx: &mut Tx,
        event_id: &str,
        showtime: DateTime<Utc>,
        seat_ids: &[String],
        booking_id: &str,
        target: SeatStatus,
    ) -> Result<(), RepositoryError>;

    /// Возвращает все места бронирования в AVAILABLE (путь отмены).
    async fn release_booking_seats(
        &self,
        tx: &mut Tx,
        booking_id: &str,
    ) -> Result<Vec<String>, RepositoryError>;
}

/// Операции над заголовками бронирований и их местами.
#[async_trait]
pub trait BookingRepository<Tx>: Send + Sync {
    /// Вставляет заголовок и по строке на место. Любой сбой — откат всей
    /// транзакции.
    async fn create_booking(&self, tx: &mut Tx, booking: &Booking)
        -> Result<(), RepositoryError>;

    async fn get_by_id(&self, booking_id: &str) -> Result<Option<Booking>, RepositoryError>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Booking>, RepositoryError>;

    /// Мягкое удаление: CANCELLED-бронирование остаётся в таблице, но
    /// последующие проверки доступности его места не учитывают.
    async fn set_status(
        &self,
        tx: &mut Tx,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<(), RepositoryError>;
}

/// Транзакции поверх пула Postgres.
#[derive(Clone)]
pub struct PgTxManager {
    pool: PgPool,
}

impl PgTxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxManager for PgTxManager {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, RepositoryError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), RepositoryError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), RepositoryError> {
        Ok(tx.rollback().await?)
    }
}
