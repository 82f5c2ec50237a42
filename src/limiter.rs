//! Per-identity token-bucket admission control.
//!
//! Each caller identity owns a bucket of `capacity` tokens refilling at
//! `refill_rate` tokens per second; one admitted request costs one token.
//! Bucket state lives behind the [`BucketStore`] trait with two backends:
//! a process-local map, and a SQLite store addressed by connection URL so
//! state can be shared across service instances. The backend is chosen once
//! when the limiter is constructed: if the configured store cannot be
//! reached, the limiter falls back to local memory for its whole lifetime.
//!
//! [`RateLimiter::allow`] never surfaces errors; a store failure during the
//! check admits the request with a warning (the limiter is a guard rail, not
//! a security boundary).

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::config::RateLimitConfig;

/// One identity's bucket: remaining tokens and the wall-clock time (epoch
/// seconds) of the last refill. Tokens stay within `[0, capacity]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill: f64,
}

/// Storage backend for bucket state.
///
/// Only two operations are needed: read the state for an identity (absent
/// means the identity has never been seen) and write it back.
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn read(&self, identity: &str) -> Result<Option<BucketState>>;
    async fn write(&self, identity: &str, state: BucketState) -> Result<()>;
}

/// Identities tracked before the stale sweep kicks in.
const SWEEP_THRESHOLD: usize = 10_000;
/// Buckets idle this long (seconds) are dropped by the sweep.
const SWEEP_IDLE_SECS: f64 = 3600.0;

/// Process-local bucket map.
///
/// The map grows with the number of distinct identities; once it passes
/// [`SWEEP_THRESHOLD`], writes drop entries whose last refill is more than
/// [`SWEEP_IDLE_SECS`] behind the entry being written.
pub struct MemoryBuckets {
    state: Mutex<HashMap<String, BucketState>>,
}

impl MemoryBuckets {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBuckets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BucketStore for MemoryBuckets {
    async fn read(&self, identity: &str) -> Result<Option<BucketState>> {
        Ok(self.state.lock().unwrap().get(identity).copied())
    }

    async fn write(&self, identity: &str, state: BucketState) -> Result<()> {
        let mut map = self.state.lock().unwrap();
        map.insert(identity.to_string(), state);
        if map.len() > SWEEP_THRESHOLD {
            let horizon = state.last_refill - SWEEP_IDLE_SECS;
            map.retain(|_, s| s.last_refill >= horizon);
        }
        Ok(())
    }
}

/// Shared bucket storage in SQLite.
///
/// State is kept as two string keys per identity (`tb:{id}:tokens` and
/// `tb:{id}:ts`) in a single key-value table, so any store offering
/// get/set of string pairs could take its place.
pub struct SqlBuckets {
    pool: SqlitePool,
}

impl SqlBuckets {
    /// Connects to the store at `url` and ensures the bucket table exists.
    /// Any failure here is the construction-time probe failing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS rate_buckets (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    async fn get(&self, key: &str) -> Result<Option<f64>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM rate_buckets WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(value,)| value.parse().ok()))
    }

    async fn set(&self, key: &str, value: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO rate_buckets (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BucketStore for SqlBuckets {
    async fn read(&self, identity: &str) -> Result<Option<BucketState>> {
        let tokens = self.get(&format!("tb:{}:tokens", identity)).await?;
        let ts = self.get(&format!("tb:{}:ts", identity)).await?;
        Ok(match (tokens, ts) {
            (Some(tokens), Some(last_refill)) => Some(BucketState {
                tokens,
                last_refill,
            }),
            _ => None,
        })
    }

    async fn write(&self, identity: &str, state: BucketState) -> Result<()> {
        // Two separate statements, like the two round trips of any plain
        // key-value store. Concurrent service instances updating the same
        // identity can interleave here and transiently over-admit.
        self.set(&format!("tb:{}:tokens", identity), state.tokens)
            .await?;
        self.set(&format!("tb:{}:ts", identity), state.last_refill)
            .await?;
        Ok(())
    }
}

/// Token-bucket rate limiter over a pluggable [`BucketStore`].
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    store: Arc<dyn BucketStore>,
    // serializes read-refill-write within this process so concurrent checks
    // for the same identity cannot lose updates
    gate: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// Builds a limiter for `config`, probing the shared store once.
    ///
    /// With no `store_url` configured the limiter is local from the start;
    /// with one configured, an unreachable store downgrades to local memory
    /// for the lifetime of this instance.
    pub async fn connect(config: &RateLimitConfig) -> Self {
        let store: Arc<dyn BucketStore> = match config.store_url.as_deref() {
            Some(url) => match SqlBuckets::connect(url).await {
                Ok(buckets) => {
                    info!("rate limiter using shared bucket store at {}", url);
                    Arc::new(buckets)
                }
                Err(err) => {
                    warn!(
                        "bucket store at {} unreachable ({}), falling back to in-memory buckets",
                        url, err
                    );
                    Arc::new(MemoryBuckets::new())
                }
            },
            None => Arc::new(MemoryBuckets::new()),
        };
        Self::with_store(config.capacity, config.refill_rate, store)
    }

    /// Builds a limiter over an explicit store.
    pub fn with_store(capacity: f64, refill_rate: f64, store: Arc<dyn BucketStore>) -> Self {
        Self {
            capacity,
            refill_rate,
            store,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds a local-memory limiter.
    pub fn in_memory(capacity: f64, refill_rate: f64) -> Self {
        Self::with_store(capacity, refill_rate, Arc::new(MemoryBuckets::new()))
    }

    /// Tries to consume one token for `identity` at the current wall-clock
    /// time. Returns whether the request is admitted.
    pub async fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, epoch_seconds()).await
    }

    /// Clock-injected admission check, used directly by tests.
    pub async fn allow_at(&self, identity: &str, now: f64) -> bool {
        let _guard = self.gate.lock().await;

        let state = match self.store.read(identity).await {
            Ok(state) => state,
            Err(err) => {
                warn!("bucket read failed, admitting request: {}", err);
                return true;
            }
        };

        let mut bucket = state.unwrap_or(BucketState {
            tokens: self.capacity,
            last_refill: now,
        });

        bucket.tokens =
            (bucket.tokens + (now - bucket.last_refill) * self.refill_rate).min(self.capacity);
        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }
        // the timestamp advances even on denial, so later refills are
        // computed from the most recent check
        bucket.last_refill = now;

        if let Err(err) = self.store.write(identity, bucket).await {
            warn!("bucket write failed: {}", err);
        }
        allowed
    }
}

/// Wall-clock time as fractional epoch seconds.
pub fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
