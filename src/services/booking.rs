//! booking.rs
//!
//! Координатор бронирования - ядро системы.
//!
//! Оркестрирует конвейер: блокировка события → транзакция → валидация по
//! каталогу → существование и доступность мест → вставка бронирования →
//! перевод мест в SOLD → commit → освобождение блокировки. Любой сбой до
//! commit обязан не оставить ни одной персистентной строки; после commit
//! бронирование долговечно, и сбой освобождения блокировки его не отменяет.
//!
//! Координатор зависит от четырёх узких интерфейсов (блокировки, каталог,
//! транзакции, репозитории) и ничего не знает про Redis/Postgres/HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::catalog::{CatalogError, EventCatalog};
use crate::lock::{event_lock_key, Acquire, LockGuard, LockStore};
use crate::models::timestamp::same_second;
use crate::models::{Booking, BookingStatus, SeatStatus};
use crate::repository::{BookingRepository, RepositoryError, SeatRepository, TxManager};

/// Ошибки бронирования, видимые границе HTTP.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("requested showtime is not scheduled for this event")]
    ShowtimeInvalid,

    #[error("event not found")]
    EventNotFound,

    #[error("booking not found")]
    BookingNotFound,

    #[error("seats not found in inventory: {0:?}")]
    SeatsMissing(Vec<String>),

    #[error("seats already taken: {0:?}")]
    SeatsTaken(Vec<String>),

    /// Блокировку события держит другой экземпляр.
    #[error("another booking for this event is in progress")]
    Conflict,

    #[error("event catalog unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Fatal(String),
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        BookingError::Fatal(err.to_string())
    }
}

impl From<CatalogError> for BookingError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => BookingError::EventNotFound,
            CatalogError::Unavailable(reason) => BookingError::UpstreamUnavailable(reason),
        }
    }
}

/// Запрос на бронирование, уже распарсенный границей.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub event_id: String,
    pub user_id: String,
    pub showtime: DateTime<Utc>,
    pub quantity: i32,
    pub seat_ids: Vec<String>,
}

impl BookingRequest {
    /// Шаг 1 конвейера: чистая валидация, без I/O.
    fn validate(&self) -> Result<(), BookingError> {
        if self.event_id.is_empty() {
            return Err(BookingError::InvalidRequest("eventId is required".into()));
        }
        if self.user_id.is_empty() {
            return Err(BookingError::InvalidRequest("userId is required".into()));
        }
        if self.quantity <= 0 {
            return Err(BookingError::InvalidRequest("quantity must be > 0".into()));
        }
        if self.seat_ids.len() != self.quantity as usize {
            return Err(BookingError::InvalidRequest(
                "seatIds length must equal quantity".into(),
            ));
        }
        if self.seat_ids.iter().any(|s| s.is_empty()) {
            return Err(BookingError::InvalidRequest("seatIds must be non-empty".into()));
        }
        for (i, seat) in self.seat_ids.iter().enumerate() {
            if self.seat_ids[..i].contains(seat) {
                return Err(BookingError::InvalidRequest(format!(
                    "duplicate seat id: {seat}"
                )));
            }
        }
        if self.showtime.timestamp() == 0 {
            return Err(BookingError::InvalidRequest("showtime is required".into()));
        }
        Ok(())
    }
}

pub struct BookingCoordinator<M: TxManager> {
    lock_store: Arc<dyn LockStore>,
    catalog: Arc<dyn EventCatalog>,
    tx_manager: M,
    seats: Arc<dyn SeatRepository<M::Tx>>,
    bookings: Arc<dyn BookingRepository<M::Tx>>,
    lock_ttl: Duration,
}

impl<M: TxManager> BookingCoordinator<M> {
    pub fn new(
        lock_store: Arc<dyn LockStore>,
        catalog: Arc<dyn EventCatalog>,
        tx_manager: M,
        seats: Arc<dyn SeatRepository<M::Tx>>,
        bookings: Arc<dyn BookingRepository<M::Tx>>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            lock_store,
            catalog,
            tx_manager,
            seats,
            bookings,
            lock_ttl,
        }
    }

    /// Публичная операция записи: подтверждает бронирование целиком либо
    /// не оставляет следов.
    pub async fn book_tickets(&self, request: BookingRequest) -> Result<Booking, BookingError> {
        request.validate()?;

        // Шаг 2: блокировка сериализует шаги 3-11 для одного события.
        let guard = self.lock_event(&request.event_id).await?;

        let result = self.book_locked(&request).await;

        // Шаг 11: после commit сбой освобождения только логируется -
        // бронирование уже долговечно, ключ истечёт по TTL.
        guard.release().await;

        result
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, BookingError> {
        self.bookings
            .get_by_id(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    pub async fn list_user_bookings(&self, user_id: &str) -> Result<Vec<Booking>, BookingError> {
        Ok(self.bookings.list_by_user(user_id).await?)
    }

    /// Отмена: мягкое удаление заголовка и возврат мест в AVAILABLE в одной
    /// транзакции, под той же блокировкой события, что и бронирование.
    /// Повторная отмена идемпотентна.
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        user_id: &str,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get_by_id(booking_id)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or(BookingError::BookingNotFound)?;

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let guard = self.lock_event(&booking.event_id).await?;
        let result = self.cancel_locked(&booking).await;
        guard.release().await;

        result
    }

    async fn lock_event(&self, event_id: &str) -> Result<LockGuard, BookingError> {
        let key = event_lock_key(event_id);
        match self.lock_store.acquire(&key, self.lock_ttl).await {
            Ok(Acquire::Acquired) => Ok(LockGuard::new(self.lock_store.clone(), key)),
            Ok(Acquire::Busy) => Err(BookingError::Conflict),
            Err(e) => Err(BookingError::Fatal(format!("lock store failure: {e}"))),
        }
    }

    async fn book_locked(&self, request: &BookingRequest) -> Result<Booking, BookingError> {
        // Шаг 3: ровно одна транзакция на бронирование.
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| BookingError::Fatal(format!("failed to begin transaction: {e}")))?;

        match self.book_in_tx(&mut tx, request).await {
            Ok(booking) => {
                // Шаг 10: точка долговечности.
                self.tx_manager
                    .commit(tx)
                    .await
                    .map_err(|e| BookingError::Fatal(format!("commit failed: {e}")))?;
                info!(
                    booking_id = %booking.booking_id,
                    event_id = %booking.event_id,
                    seats = booking.quantity,
                    "booking confirmed"
                );
                Ok(booking)
            }
            Err(err) => {
                if let Err(rb) = self.tx_manager.rollback(tx).await {
                    error!("rollback failed after booking error: {rb}");
                }
                Err(err)
            }
        }
    }

    /// Шаги 4-9. Любая ошибка отсюда приводит к откату в `book_locked`.
    async fn book_in_tx(
        &self,
        tx: &mut M::Tx,
        request: &BookingRequest,
    ) -> Result<Booking, BookingError> {
        // Шаг 4: событие запрашивается из каталога заново на каждое
        // бронирование.
        let event = self.catalog.get_event(&request.event_id).await?;

        // Шаг 5: сверка времени показа с точностью до секунды, любое
        // совпадение из списка принимается.
        let scheduled = event
            .show_date_times
            .iter()
            .any(|t| same_second(t.0, request.showtime));
        if !scheduled {
            warn!(
                event_id = %request.event_id,
                showtime = %request.showtime,
                "requested showtime not in catalog schedule"
            );
            return Err(BookingError::ShowtimeInvalid);
        }

        // Шаг 6: существование мест. Его провал перекрывает провал
        // доступности для того же места.
        let missing = self
            .seats
            .validate_seats_exist(tx, &request.event_id, request.showtime, &request.seat_ids)
            .await?;
        if !missing.is_empty() {
            return Err(BookingError::SeatsMissing(missing));
        }

        // Шаг 7: всё или ничего - одно занятое место валит бронирование.
        let taken = self
            .seats
            .check_availability(tx, &request.event_id, request.showtime, &request.seat_ids)
            .await?;
        if !taken.is_empty() {
            return Err(BookingError::SeatsTaken(taken));
        }

        // Шаг 8: заголовок + строки мест, статус сразу CONFIRMED.
        let booking = Booking::new_confirmed(
            &request.event_id,
            &request.user_id,
            request.showtime,
            request.seat_ids.clone(),
        );
        self.bookings.create_booking(tx, &booking).await?;

        // Шаг 9: условный переход AVAILABLE → SOLD с проверкой числа
        // затронутых строк.
        match self
            .seats
            .update_seats_status(
                tx,
                &request.event_id,
                request.showtime,
                &request.seat_ids,
                &booking.booking_id,
                SeatStatus::Sold,
            )
            .await
        {
            Ok(()) => Ok(booking),
            Err(RepositoryError::SeatCountMismatch { expected, actual }) => {
                // Гонка, которую должна была исключить блокировка: либо
                // ключ настроен неверно, либо инвентарь правили в обход
                // координатора. Сигнал для дежурного.
                error!(
                    alarm = "seat_count_mismatch",
                    event_id = %request.event_id,
                    expected,
                    actual,
                    "conditional seat update raced past the event lock"
                );
                Err(BookingError::Fatal(format!(
                    "seat transition affected {actual} rows, expected {expected}"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel_locked(&self, booking: &Booking) -> Result<Booking, BookingError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| BookingError::Fatal(format!("failed to begin transaction: {e}")))?;

        match self.cancel_in_tx(&mut tx, booking).await {
            Ok(freed) => {
                self.tx_manager
                    .commit(tx)
                    .await
                    .map_err(|e| BookingError::Fatal(format!("commit failed: {e}")))?;
                info!(
                    booking_id = %booking.booking_id,
                    freed = freed.len(),
                    "booking cancelled, seats released"
                );
                let mut cancelled = booking.clone();
                cancelled.status = BookingStatus::Cancelled;
                Ok(cancelled)
            }
            Err(err) => {
                if let Err(rb) = self.tx_manager.rollback(tx).await {
                    error!("rollback failed after cancel error: {rb}");
                }
                Err(err)
            }
        }
    }

    async fn cancel_in_tx(
        &self,
        tx: &mut M::Tx,
        booking: &Booking,
    ) -> Result<Vec<String>, BookingError> {
        self.bookings
            .set_status(tx, &booking.booking_id, BookingStatus::Cancelled)
            .await?;
        let freed = self
            .seats
            .release_booking_seats(tx, &booking.booking_id)
            .await?;
        Ok(freed)
    }
}
