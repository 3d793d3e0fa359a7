//! lock.rs
//!
//! Распределённая блокировка поверх Redis.
//!
//! Один держатель на ключ среди всех экземпляров сервиса. Захват — атомарный
//! `SET NX EX`, освобождение — `DEL` без проверки держателя: корректность при
//! сбое обеспечивает TTL, а не освобождение.

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("lock store error: {0}")]
pub struct LockError(pub String);

/// Результат попытки захвата.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    /// Ключ уже занят другим держателем.
    Busy,
}

#[async_trait]
pub trait LockStore: Send + Sync {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Acquire, LockError>;
    async fn release(&self, key: &str) -> Result<(), LockError>;
}

/// Ключ блокировки для события.
pub fn event_lock_key(event_id: &str) -> String {
    format!("booking:lock:{}", event_id)
}

#[derive(Clone)]
pub struct RedisLockStore {
    conn: MultiplexedConnection,
}

impl RedisLockStore {
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisLockStore { conn })
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Acquire, LockError> {
        let mut conn = self.conn.clone();

        // SET NX EX - атомарная операция без гонок
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX") // только если ключа нет
            .arg("EX") // TTL в секундах
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError(e.to_string()))?;

        // NX возвращает Nil, если ключ уже существует.
        Ok(match result {
            Some(_) => Acquire::Acquired,
            None => Acquire::Busy,
        })
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError(e.to_string()))?;
        Ok(())
    }
}

/// Страж захваченной блокировки.
///
/// Явный `release` используется на штатных путях выхода; если future запроса
/// отменили между захватом и коммитом, Drop отпускает ключ в фоне. Обе
/// операции best-effort: при их сбое ключ истечёт по TTL.
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    key: String,
    released: bool,
}

impl LockGuard {
    pub fn new(store: Arc<dyn LockStore>, key: String) -> Self {
        LockGuard {
            store,
            key,
            released: false,
        }
    }

    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = self.store.release(&self.key).await {
            warn!("failed to release lock {}: {} (TTL will expire it)", self.key, e);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let store = self.store.clone();
            let key = std::mem::take(&mut self.key);
            tokio::spawn(async move {
                if let Err(e) = store.release(&key).await {
                    warn!("failed to release lock {} on drop: {}", key, e);
                }
            });
        }
    }
}
