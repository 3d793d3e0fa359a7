pub mod catalog;
pub mod config;
pub mod controllers;
pub mod database;
pub mod lock;
pub mod models;
pub mod repository;
pub mod services;

use repository::PgTxManager;
use services::BookingCoordinator;

// Shared state для всего приложения
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub coordinator: BookingCoordinator<PgTxManager>,
}
