//! Redis coordination store using a bb8 connection pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, Script};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::settings::RedisStoreConfig;
use crate::store::{CoordinationStore, Expiry, SetOptions, StoreError};

type RedisPool = Pool<Client>;

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const SCAN_BATCH: usize = 100;

/// Redis-backed coordination store.
pub struct RedisStore {
    pool: RedisPool,
    available: Arc<AtomicBool>,
    compare_and_delete: Script,
}

impl RedisStore {
    /// Build the pool and ping the server once.
    ///
    /// An unreachable server is not an error here: the store starts out
    /// unavailable and the health monitor flips it back when Redis answers.
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, StoreError> {
        let url = config.connection_url();
        let client = Client::open(url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            available: Arc::new(AtomicBool::new(false)),
            compare_and_delete: Script::new(COMPARE_AND_DELETE_SCRIPT),
        };

        match ping(&store.pool).await {
            Ok(()) => {
                store.available.store(true, Ordering::SeqCst);
                tracing::info!(host = %config.display_host(), "Connected to coordination store");
            }
            Err(e) => {
                tracing::warn!(error = %e, host = %config.display_host(), "Coordination store unreachable at startup");
            }
        }

        Ok(store)
    }

    /// Periodically PING the server and update availability.
    pub fn spawn_health_monitor(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let available = Arc::clone(&self.available);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                let healthy = ping(&pool).await.is_ok();
                let was_healthy = available.swap(healthy, Ordering::SeqCst);
                if healthy != was_healthy {
                    if healthy {
                        tracing::info!("Coordination store is reachable again");
                    } else {
                        tracing::warn!("Coordination store became unreachable");
                    }
                }
            }
            tracing::debug!("Store health monitor stopped");
        })
    }

    async fn get_conn(&self) -> Result<PooledConnection<'_, Client>, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable);
        }
        self.pool.get().await.map_err(|e| {
            self.available.store(false, Ordering::SeqCst);
            StoreError::Connection(e.to_string())
        })
    }

    fn map_err(&self, e: RedisError) -> StoreError {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
            self.available.store(false, Ordering::SeqCst);
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Operation(e.to_string())
        }
    }
}

async fn ping(pool: &RedisPool) -> Result<(), StoreError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    let conn_ref: &mut MultiplexedConnection = &mut conn;
    redis::cmd("PING")
        .query_async::<String>(conn_ref)
        .await
        .map(|_| ())
        .map_err(|e| StoreError::Connection(e.to_string()))
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<bool, StoreError> {
        let mut conn = self.get_conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        match options.expiry {
            Some(Expiry::Seconds(secs)) => {
                cmd.arg("EX").arg(secs);
            }
            Some(Expiry::Milliseconds(ms)) => {
                cmd.arg("PX").arg(ms);
            }
            None => {}
        }
        if options.only_if_absent {
            cmd.arg("NX");
        }

        // SET replies OK, or nil when NX refused the write
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let reply: Option<String> = cmd.query_async(conn_ref).await.map_err(|e| self.map_err(e))?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        conn_ref
            .get::<_, Option<String>>(key)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let removed: i64 = conn_ref.del(key).await.map_err(|e| self.map_err(e))?;
        Ok(removed > 0)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(conn_ref)
            .await
            .map_err(|e| self.map_err(e))?;
        Ok(removed > 0)
    }

    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let mut conn = self.get_conn().await?;
        let pattern = escape_glob(prefix);

        let mut keys: Vec<String> = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let conn_ref: &mut MultiplexedConnection = &mut conn;
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn_ref)
                .await
                .map_err(|e| self.map_err(e))?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort();
        keys.dedup();

        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(conn_ref)
            .await
            .map_err(|e| self.map_err(e))?;

        // Keys can expire between SCAN and MGET
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
