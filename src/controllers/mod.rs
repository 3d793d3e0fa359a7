//! mod.rs
//!
//! Корневой модуль маршрутизации API.

pub mod bookings;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Собирает и возвращает главный маршрутизатор приложения.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().merge(bookings::routes())
}
