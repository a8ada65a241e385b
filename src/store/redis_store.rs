use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{Client, Script, aio::ConnectionManager};
use tokio::time::sleep;
use tracing::debug;

use super::{CredentialStore, DEFAULT_KEY_PREFIX, LOCK_POLL_INTERVAL, LockGuard, MAX_TTL};
use crate::error::StoreError;

/// Deletes the lock only if it still carries the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Credential store backed by Redis, shared by every worker of a deployment.
///
/// TTLs and lock expiry are enforced by Redis itself (`PX`), so all readers
/// observe expiry at the same moment regardless of their local clocks.
#[derive(Clone)]
pub struct RedisCredentialStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCredentialStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with_prefix(url, DEFAULT_KEY_PREFIX).await
    }

    /// Connects using a custom key prefix, e.g. to isolate test runs.
    pub async fn connect_with_prefix(url: &str, prefix: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(self.key(name))
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn try_lock(&self, guard: &LockGuard, hold_timeout: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(&guard.name))
            .arg(&guard.token)
            .arg("NX")
            .arg("PX")
            .arg(millis(hold_timeout))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.min(MAX_TTL).as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn put_access(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key("access_token");
        if ttl.is_zero() {
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            return Ok(());
        }

        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn put_refresh(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(self.key("refresh_token"))
            .arg(token)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_access(&self) -> Result<Option<String>, StoreError> {
        self.get("access_token").await
    }

    async fn get_refresh(&self) -> Result<Option<String>, StoreError> {
        self.get("refresh_token").await
    }

    async fn acquire_lock(
        &self,
        name: &str,
        hold_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<LockGuard, StoreError> {
        let guard = LockGuard::new(name);
        let started = Instant::now();
        let deadline = started + wait_timeout;

        loop {
            if self.try_lock(&guard, hold_timeout).await? {
                debug!(lock = name, "lock acquired");
                return Ok(guard);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(StoreError::LockContended {
                    name: name.to_string(),
                    waited: now - started,
                });
            }
            sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release_lock(&self, guard: LockGuard) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(self.key(&guard.name))
            .arg(&guard.token)
            .invoke_async(&mut conn)
            .await?;
        if deleted == 0 {
            debug!(lock = %guard.name, "lock already expired before release");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(self.key("access_token"))
            .arg(self.key("refresh_token"))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
