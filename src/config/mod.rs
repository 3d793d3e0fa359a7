use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub event_api: EventApiConfig,
    pub booking: BookingConfig,
    pub features: FeatureFlags,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis (хранилище распределённых блокировок)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки внешнего каталога событий
#[derive(Debug, Clone, Deserialize)]
pub struct EventApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

// Настройки конвейера бронирования
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    // TTL блокировки должен превышать худший случай критической секции.
    pub lock_ttl_seconds: u64,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    // Совместимость со схемой без таблицы инвентаря: проверка существования
    // мест считает любые места существующими. По умолчанию выключено.
    pub legacy_seat_fallback: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "booking_system=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            },
            event_api: EventApiConfig {
                base_url: env::var("EVENT_API_URL").expect("EVENT_API_URL must be set"),
                timeout_seconds: env::var("EVENT_API_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("EVENT_API_TIMEOUT_SECONDS must be a valid number"),
            },
            booking: BookingConfig {
                lock_ttl_seconds: env::var("BOOKING_LOCK_TTL_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("BOOKING_LOCK_TTL_SECONDS must be a valid number"),
            },
            features: FeatureFlags {
                legacy_seat_fallback: env::var("LEGACY_SEAT_FALLBACK")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .expect("LEGACY_SEAT_FALLBACK must be true or false"),
            },
        }
    }
}
