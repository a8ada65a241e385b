use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::time::sleep;

use super::{CredentialStore, LOCK_POLL_INTERVAL, LockGuard, MAX_TTL};
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

#[derive(Default)]
struct Slots {
    access: Option<Entry>,
    refresh: Option<Entry>,
    locks: HashMap<String, Entry>,
}

/// Single-process credential store.
///
/// Expiry is evaluated against a monotonic clock on every read, so an
/// expired access token is never returned even though nothing deletes it.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    slots: Mutex<Slots>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, Slots>, StoreError> {
        self.slots
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store poisoned".to_string()))
    }

    fn try_lock(&self, guard: &LockGuard, hold_timeout: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut slots = self.slots()?;
        match slots.locks.get(&guard.name) {
            Some(held) if held.is_live(now) => Ok(false),
            _ => {
                slots.locks.insert(
                    guard.name.clone(),
                    Entry {
                        value: guard.token.clone(),
                        expires_at: Some(now + hold_timeout.min(MAX_TTL)),
                    },
                );
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn put_access(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut slots = self.slots()?;
        slots.access = if ttl.is_zero() {
            None
        } else {
            Some(Entry {
                value: token.to_string(),
                expires_at: Some(Instant::now() + ttl.min(MAX_TTL)),
            })
        };
        Ok(())
    }

    async fn put_refresh(&self, token: &str) -> Result<(), StoreError> {
        self.slots()?.refresh = Some(Entry {
            value: token.to_string(),
            expires_at: None,
        });
        Ok(())
    }

    async fn get_access(&self) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut slots = self.slots()?;
        match &slots.access {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                slots.access = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn get_refresh(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slots()?.refresh.as_ref().map(|e| e.value.clone()))
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
            if self.try_lock(&guard, hold_timeout)? {
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
        let mut slots = self.slots()?;
        if slots
            .locks
            .get(&guard.name)
            .is_some_and(|held| held.value == guard.token)
        {
            slots.locks.remove(&guard.name);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut slots = self.slots()?;
        slots.access = None;
        slots.refresh = None;
        Ok(())
    }
}
