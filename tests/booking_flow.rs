//! Сквозные сценарии конвейера бронирования на in-memory фейках.
//!
//! Проверяются инварианты ядра: уникальность подтверждённых мест,
//! зеркальность bookings/инвентаря, атомарность при сбое любого шага,
//! освобождение мест при отмене и независимость показов/событий.


use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::Ordering;

use booking_system::models::{BookingStatus, SeatStatus};
use booking_system::services::{BookingError, BookingRequest};
use mocks::{test_env, test_env_with_store, InMemoryStore, TestEnv};

fn showtime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 25, 19, 0, 0).unwrap()
}

fn request(event_id: &str, user_id: &str, at: DateTime<Utc>, seats: &[&str]) -> BookingRequest {
    BookingRequest {
        event_id: event_id.to_string(),
        user_id: user_id.to_string(),
        showtime: at,
        quantity: seats.len() as i32,
        seat_ids: seats.iter().map(|s| s.to_string()).collect(),
    }
}

/// Событие "1" с одним показом и местами A1..A5.
async fn standard_env() -> TestEnv {
    let env = test_env();
    env.catalog.put_event("1", &["2025-12-25T19:00:00"]).await;
    env.store
        .seed_seats("1", showtime(), &["A1", "A2", "A3", "A4", "A5"])
        .await;
    env
}

#[tokio::test]
async fn happy_path_confirms_booking_and_sells_seats() {
    let env = standard_env().await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .expect("booking should succeed");

    assert!(booking.booking_id.starts_with("BK-"));
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.quantity, 2);

    // Инвентарь зеркален бронированию: оба места SOLD с его booking_id.
    for seat_id in ["A1", "A2"] {
        let seat = env.store.seat("1", showtime(), seat_id).await;
        assert_eq!(seat.status, SeatStatus::Sold);
        assert_eq!(seat.booking_id.as_deref(), Some(booking.booking_id.as_str()));
        assert!(seat.sold_at.is_some());
    }
    // Остальные не тронуты.
    for seat_id in ["A3", "A4", "A5"] {
        let seat = env.store.seat("1", showtime(), seat_id).await;
        assert_eq!(seat.status, SeatStatus::Available);
        assert!(seat.booking_id.is_none());
    }

    assert_eq!(env.store.confirmed_bookings().await.len(), 1);
}

#[tokio::test]
async fn duplicate_booking_rejected_with_taken_seats() {
    let env = standard_env().await;

    let first = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap();

    let err = env
        .coordinator
        .book_tickets(request("1", "v", showtime(), &["A1", "A2"]))
        .await
        .unwrap_err();

    match err {
        BookingError::SeatsTaken(mut taken) => {
            taken.sort();
            assert_eq!(taken, vec!["A1".to_string(), "A2".to_string()]);
        }
        other => panic!("expected SeatsTaken, got {other:?}"),
    }

    // Места остаются за первым бронированием, нового заголовка нет.
    let seat = env.store.seat("1", showtime(), "A1").await;
    assert_eq!(seat.booking_id.as_deref(), Some(first.booking_id.as_str()));
    assert_eq!(env.store.confirmed_bookings().await.len(), 1);
}

#[tokio::test]
async fn partial_conflict_is_all_or_nothing() {
    let env = standard_env().await;

    env.coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap();

    let err = env
        .coordinator
        .book_tickets(request("1", "v", showtime(), &["A1", "A3", "A4"]))
        .await
        .unwrap_err();

    match err {
        BookingError::SeatsTaken(taken) => assert_eq!(taken, vec!["A1".to_string()]),
        other => panic!("expected SeatsTaken, got {other:?}"),
    }

    // Ни частичного захвата, ни лишних заголовков.
    for seat_id in ["A3", "A4"] {
        let seat = env.store.seat("1", showtime(), seat_id).await;
        assert_eq!(seat.status, SeatStatus::Available);
    }
    assert_eq!(env.store.confirmed_bookings().await.len(), 1);
}

#[tokio::test]
async fn unknown_seats_reported_missing() {
    let env = standard_env().await;
    let before = env.store.snapshot().await;

    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["Z9"]))
        .await
        .unwrap_err();

    match err {
        BookingError::SeatsMissing(missing) => assert_eq!(missing, vec!["Z9".to_string()]),
        other => panic!("expected SeatsMissing, got {other:?}"),
    }

    let after = env.store.snapshot().await;
    assert_eq!(before.bookings.len(), after.bookings.len());
    assert!(after.seats.iter().all(|s| s.status == SeatStatus::Available));
}

#[tokio::test]
async fn missing_seats_supersede_taken_seats() {
    let env = standard_env().await;

    env.coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap();

    // A1 занят, Z9 не существует: несуществование побеждает.
    let err = env
        .coordinator
        .book_tickets(request("1", "v", showtime(), &["A1", "Z9"]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::SeatsMissing(ref m) if m == &vec!["Z9".to_string()]));
}

#[tokio::test]
async fn showtime_mismatch_rejected() {
    let env = test_env();
    env.catalog.put_event("1", &["2025-07-15T19:00:00"]).await;
    let wrong_day = Utc.with_ymd_and_hms(2025, 7, 16, 19, 0, 0).unwrap();
    env.store.seed_seats("1", wrong_day, &["A1"]).await;

    let err = env
        .coordinator
        .book_tickets(request("1", "u", wrong_day, &["A1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, BookingError::ShowtimeInvalid));
}

#[tokio::test]
async fn naive_and_utc_timestamps_interop() {
    // Каталог отдаёт время без смещения, клиент шлёт RFC3339 с Z -
    // оба обязаны свестись к одному моменту UTC.
    let env = test_env();
    env.catalog.put_event("1", &["2025-07-15T19:00:00"]).await;
    let at = Utc.with_ymd_and_hms(2025, 7, 15, 19, 0, 0).unwrap();
    env.store.seed_seats("1", at, &["A1"]).await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", at, &["A1"]))
        .await
        .expect("formats must compare equal at second precision");

    assert_eq!(booking.showtime, at);
}

#[tokio::test]
async fn cancel_releases_seats_for_rebooking() {
    let env = standard_env().await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap();

    let cancelled = env
        .coordinator
        .cancel_booking(&booking.booking_id, "u")
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // Инвентарь освобождён в той же транзакции, что и смена статуса.
    for seat_id in ["A1", "A2"] {
        let seat = env.store.seat("1", showtime(), seat_id).await;
        assert_eq!(seat.status, SeatStatus::Available);
        assert!(seat.booking_id.is_none());
        assert!(seat.sold_at.is_none());
    }

    // Повторное бронирование тех же мест проходит.
    let rebooked = env
        .coordinator
        .book_tickets(request("1", "v", showtime(), &["A1", "A2"]))
        .await
        .expect("cancelled seats must be rebookable");
    assert_ne!(rebooked.booking_id, booking.booking_id);
}

#[tokio::test]
async fn cancel_is_idempotent_and_scoped_to_owner() {
    let env = standard_env().await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap();

    // Чужой пользователь бронирования не видит.
    let err = env
        .coordinator
        .cancel_booking(&booking.booking_id, "someone-else")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound));

    env.coordinator
        .cancel_booking(&booking.booking_id, "u")
        .await
        .unwrap();
    let again = env
        .coordinator
        .cancel_booking(&booking.booking_id, "u")
        .await
        .expect("second cancel is a no-op");
    assert_eq!(again.status, BookingStatus::Cancelled);

    let err = env
        .coordinator
        .cancel_booking("BK-does-not-exist", "u")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::BookingNotFound));
}

#[tokio::test]
async fn reads_return_bookings_with_seats() {
    let env = standard_env().await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap();

    let fetched = env.coordinator.get_booking(&booking.booking_id).await.unwrap();
    assert_eq!(fetched.seat_ids, booking.seat_ids);

    let listed = env.coordinator.list_user_bookings("u").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].booking_id, booking.booking_id);

    assert!(matches!(
        env.coordinator.get_booking("BK-missing").await.unwrap_err(),
        BookingError::BookingNotFound
    ));
}

#[tokio::test]
async fn event_not_found_and_outage_map_to_distinct_errors() {
    let env = standard_env().await;

    let err = env
        .coordinator
        .book_tickets(request("404", "u", showtime(), &["A1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::EventNotFound));

    env.catalog.unavailable.store(true, Ordering::Relaxed);
    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::UpstreamUnavailable(_)));

    // Сбой до вставки: персистентных следов нет.
    assert!(env.store.confirmed_bookings().await.is_empty());
}

#[tokio::test]
async fn held_lock_yields_conflict() {
    let env = standard_env().await;

    // Пир держит блокировку этого события.
    use booking_system::lock::LockStore;
    env.locks
        .acquire("booking:lock:1", std::time::Duration::from_secs(30))
        .await
        .unwrap();

    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict));
    assert!(env.store.confirmed_bookings().await.is_empty());
}

#[tokio::test]
async fn lock_transport_failure_is_fatal() {
    let env = standard_env().await;
    env.locks.fail_transport.store(true, Ordering::Relaxed);

    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Fatal(_)));
}

#[tokio::test]
async fn lock_is_released_after_both_success_and_failure() {
    let env = standard_env().await;

    env.coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .unwrap();
    assert!(!env.locks.is_held("booking:lock:1").await);

    let _ = env
        .coordinator
        .book_tickets(request("1", "v", showtime(), &["A1"]))
        .await
        .unwrap_err();
    assert!(!env.locks.is_held("booking:lock:1").await);
}

#[tokio::test]
async fn commit_failure_leaves_no_side_effects() {
    let env = standard_env().await;
    env.store.fail_commit.store(true, Ordering::Relaxed);

    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Fatal(_)));

    // Атомарность: ни заголовка, ни строк мест, ни переходов статусов.
    let state = env.store.snapshot().await;
    assert!(state.bookings.is_empty());
    assert!(state.seats.iter().all(|s| s.status == SeatStatus::Available));
    assert!(!env.locks.is_held("booking:lock:1").await);
}

#[tokio::test]
async fn blocked_seat_trips_row_count_guard() {
    // BLOCKED не входит в RESERVED/SOLD, поэтому проверку доступности
    // проходит, но условный UPDATE со статусом AVAILABLE его не трогает -
    // срабатывает контроль числа затронутых строк, и транзакция вместе со
    // вставленным заголовком откатывается целиком.
    let env = test_env();
    env.catalog.put_event("1", &["2025-12-25T19:00:00"]).await;
    env.store.seed_seats("1", showtime(), &["A1", "A2"]).await;
    env.store
        .set_seat_status("1", showtime(), "A2", SeatStatus::Blocked)
        .await;

    let err = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Fatal(_)));

    let state = env.store.snapshot().await;
    assert!(state.bookings.is_empty());
    let a1 = env.store.seat("1", showtime(), "A1").await;
    assert_eq!(a1.status, SeatStatus::Available);
    assert!(a1.booking_id.is_none());
}

#[tokio::test]
async fn cross_showtime_independence() {
    // Один и тот же набор мест на разных показах одного события.
    let env = test_env();
    env.catalog
        .put_event("1", &["2025-12-25T19:00:00", "2025-12-26T19:00:00"])
        .await;
    let evening = showtime();
    let next_day = Utc.with_ymd_and_hms(2025, 12, 26, 19, 0, 0).unwrap();
    env.store.seed_seats("1", evening, &["A1", "A2"]).await;
    env.store.seed_seats("1", next_day, &["A1", "A2"]).await;

    env.coordinator
        .book_tickets(request("1", "u", evening, &["A1", "A2"]))
        .await
        .expect("first showtime");
    env.coordinator
        .book_tickets(request("1", "v", next_day, &["A1", "A2"]))
        .await
        .expect("second showtime must be independent");

    assert_eq!(env.store.confirmed_bookings().await.len(), 2);
}

#[tokio::test]
async fn cross_event_independence() {
    // Одинаковые метки мест у разных событий не конфликтуют.
    let env = test_env();
    env.catalog.put_event("1", &["2025-12-25T19:00:00"]).await;
    env.catalog.put_event("2", &["2025-12-25T19:00:00"]).await;
    env.store.seed_seats("1", showtime(), &["A1"]).await;
    env.store.seed_seats("2", showtime(), &["A1"]).await;

    env.coordinator
        .book_tickets(request("1", "u", showtime(), &["A1"]))
        .await
        .expect("event 1");
    env.coordinator
        .book_tickets(request("2", "v", showtime(), &["A1"]))
        .await
        .expect("event 2 must be independent");

    assert_eq!(env.store.confirmed_bookings().await.len(), 2);
}

#[tokio::test]
async fn concurrent_clients_exactly_one_winner() {
    // N параллельных клиентов целятся в одни места одного показа:
    // ровно один побеждает, остальные видят SeatsTaken или Conflict,
    // в инвентаре ровно один booking_id.
    let env = standard_env().await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let coordinator = env.coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .book_tickets(request("1", &format!("user-{i}"), showtime(), &["A1", "A2"]))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("task must not panic") {
            Ok(_) => winners += 1,
            Err(BookingError::SeatsTaken(_)) | Err(BookingError::Conflict) => {}
            Err(other) => panic!("unexpected loser error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);

    let confirmed = env.store.confirmed_bookings().await;
    assert_eq!(confirmed.len(), 1);
    let winner_id = confirmed[0].booking_id.clone();
    for seat_id in ["A1", "A2"] {
        let seat = env.store.seat("1", showtime(), seat_id).await;
        assert_eq!(seat.status, SeatStatus::Sold);
        assert_eq!(seat.booking_id.as_deref(), Some(winner_id.as_str()));
    }
}

#[tokio::test]
async fn legacy_fallback_accepts_unprovisioned_showtime() {
    // Легаси-режим: инвентарь для показа не заведён, существование мест
    // не проверяется, переходы статусов не выполняются.
    let env = test_env_with_store(InMemoryStore::with_legacy_fallback());
    env.catalog.put_event("1", &["2025-12-25T19:00:00"]).await;

    let booking = env
        .coordinator
        .book_tickets(request("1", "u", showtime(), &["A1", "A2"]))
        .await
        .expect("legacy mode books without inventory");

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert!(env.store.snapshot().await.seats.is_empty());
}
