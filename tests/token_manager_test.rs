use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use spotify_broadcast::{
    crypto::TokenCipher,
    error::{StoreError, TokenError},
    spotify::auth::TokenProvider,
    store::{CredentialStore, InMemoryCredentialStore, LockGuard, REFRESH_LOCK_NAME},
    token::{RefreshSettings, TokenManager},
    types::TokenResponse,
};

// Provider double that counts calls and answers with a scripted response
struct FakeProvider {
    calls: AtomicUsize,
    delay: Duration,
    response: Result<TokenResponse, (u16, String)>,
    seen_refresh_tokens: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn ok(access_token: &str, expires_in: Option<u64>, refresh_token: Option<&str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            response: Ok(TokenResponse {
                access_token: access_token.to_string(),
                token_type: "Bearer".to_string(),
                expires_in,
                refresh_token: refresh_token.map(str::to_string),
                scope: None,
            }),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        }
    }

    fn failing(status: u16, body: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            response: Err((status, body.to_string())),
            seen_refresh_tokens: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self) -> Result<TokenResponse, TokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response
            .clone()
            .map_err(|(status, body)| TokenError::UpstreamRefreshFailed { status, body })
    }
}

#[async_trait]
impl TokenProvider for FakeProvider {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TokenError> {
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.answer().await
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, TokenError> {
        self.answer().await
    }
}

struct Harness {
    store: Arc<InMemoryCredentialStore>,
    provider: Arc<FakeProvider>,
    cipher: TokenCipher,
    manager: Arc<TokenManager>,
}

fn harness(provider: FakeProvider) -> Harness {
    harness_with(provider, RefreshSettings::default())
}

fn harness_with(provider: FakeProvider, settings: RefreshSettings) -> Harness {
    let store = Arc::new(InMemoryCredentialStore::new());
    let provider = Arc::new(provider);
    let cipher = TokenCipher::new(&[7u8; 32]);
    let manager = Arc::new(TokenManager::new(
        store.clone(),
        provider.clone(),
        cipher.clone(),
        settings,
    ));
    Harness {
        store,
        provider,
        cipher,
        manager,
    }
}

impl Harness {
    async fn seed_refresh(&self, token: &str) {
        let sealed = self.cipher.encrypt(token).unwrap();
        self.store.put_refresh(&sealed).await.unwrap();
    }

    async fn seed_access(&self, token: &str, ttl: Duration) {
        let sealed = self.cipher.encrypt(token).unwrap();
        self.store.put_access(&sealed, ttl).await.unwrap();
    }

    async fn stored_refresh(&self) -> Option<String> {
        self.store
            .get_refresh()
            .await
            .unwrap()
            .map(|sealed| self.cipher.decrypt(&sealed).unwrap())
    }

    async fn stored_access(&self) -> Option<String> {
        self.store
            .get_access()
            .await
            .unwrap()
            .map(|sealed| self.cipher.decrypt(&sealed).unwrap())
    }
}

#[tokio::test]
async fn test_refresh_once_then_serve_from_store() {
    let h = harness(FakeProvider::ok("A1", Some(3600), None));
    h.seed_refresh("R1").await;

    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A1");
    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A1");

    // One upstream call, made with R1, and R1 is still the stored refresh token
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(*h.provider.seen_refresh_tokens.lock().unwrap(), vec!["R1"]);
    assert_eq!(h.stored_refresh().await.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_fast_path_never_calls_upstream() {
    let h = harness(FakeProvider::ok("new", Some(3600), None));
    h.seed_refresh("R1").await;
    h.seed_access("cached", Duration::from_secs(60)).await;

    for _ in 0..5 {
        assert_eq!(h.manager.get_valid_token().await.unwrap(), "cached");
    }
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let h = harness(
        FakeProvider::ok("A1", Some(3600), Some("R2")).with_delay(Duration::from_millis(200)),
    );
    h.seed_refresh("R1").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&h.manager);
        handles.push(tokio::spawn(
            async move { manager.get_valid_token().await },
        ));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "A1");
    }
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(h.stored_refresh().await.as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_rotated_refresh_token_replaces_old_one() {
    let h = harness(FakeProvider::ok("A1", Some(3600), Some("R2")));
    h.seed_refresh("R1").await;

    h.manager.get_valid_token().await.unwrap();
    assert_eq!(h.stored_refresh().await.as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_missing_refresh_token_is_no_credentials() {
    let h = harness(FakeProvider::ok("A1", Some(3600), None));

    let err = h.manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::NoCredentials));
    assert!(err.needs_reauth());
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_failed_refresh_keeps_refresh_token_and_releases_lock() {
    let h = harness(FakeProvider::failing(
        400,
        r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#,
    ));
    h.seed_refresh("R1").await;

    let err = h.manager.get_valid_token().await.unwrap_err();
    match &err {
        TokenError::UpstreamRefreshFailed { status, body } => {
            assert_eq!(*status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.needs_reauth());

    assert_eq!(h.stored_refresh().await.as_deref(), Some("R1"));
    assert_eq!(h.stored_access().await, None);

    // Lock was handed back: it can be taken again without waiting
    let guard = h
        .store
        .acquire_lock(REFRESH_LOCK_NAME, Duration::from_secs(5), Duration::ZERO)
        .await
        .unwrap();
    h.store.release_lock(guard).await.unwrap();
}

#[tokio::test]
async fn test_held_lock_surfaces_refresh_contended() {
    let settings = RefreshSettings {
        lock_wait: Duration::from_millis(300),
        ..RefreshSettings::default()
    };
    let h = harness_with(FakeProvider::ok("A1", Some(3600), None), settings);
    h.seed_refresh("R1").await;

    let _held = h
        .store
        .acquire_lock(REFRESH_LOCK_NAME, Duration::from_secs(30), Duration::ZERO)
        .await
        .unwrap();

    let started = Instant::now();
    let err = h.manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::RefreshContended));
    assert!(err.is_retryable());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_waiter_uses_token_written_by_lock_holder() {
    let h = harness(FakeProvider::ok("from-upstream", Some(3600), None));
    h.seed_refresh("R1").await;

    let guard = h
        .store
        .acquire_lock(REFRESH_LOCK_NAME, Duration::from_secs(30), Duration::ZERO)
        .await
        .unwrap();

    let manager = Arc::clone(&h.manager);
    let waiter = tokio::spawn(async move { manager.get_valid_token().await });

    // Another process finishes its refresh while the waiter is blocked
    tokio::time::sleep(Duration::from_millis(150)).await;
    h.seed_access("from-other-process", Duration::from_secs(60))
        .await;
    h.store.release_lock(guard).await.unwrap();

    assert_eq!(waiter.await.unwrap().unwrap(), "from-other-process");
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_missing_expires_in_uses_configured_default() {
    let settings = RefreshSettings {
        default_expires_in: Duration::from_secs(1),
        ..RefreshSettings::default()
    };
    let h = harness_with(FakeProvider::ok("A1", None, None), settings);
    h.seed_refresh("R1").await;

    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A1");
    assert_eq!(h.stored_access().await.as_deref(), Some("A1"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(h.stored_access().await, None);
}

#[tokio::test]
async fn test_store_holds_only_ciphertext() {
    let h = harness(FakeProvider::ok("A1", Some(3600), Some("R2")));
    h.seed_refresh("R1").await;
    h.manager.get_valid_token().await.unwrap();

    let raw_access = h.store.get_access().await.unwrap().unwrap();
    let raw_refresh = h.store.get_refresh().await.unwrap().unwrap();
    assert_ne!(raw_access, "A1");
    assert_ne!(raw_refresh, "R2");
    assert!(!raw_access.contains("A1"));
}

#[tokio::test]
async fn test_foreign_key_ciphertext_is_a_cipher_error() {
    let h = harness(FakeProvider::ok("A1", Some(3600), None));
    let other = TokenCipher::new(&[9u8; 32]);
    h.store
        .put_refresh(&other.encrypt("R1").unwrap())
        .await
        .unwrap();

    let err = h.manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::Cipher(_)));
}

#[tokio::test]
async fn test_store_authorization_requires_a_refresh_token() {
    let h = harness(FakeProvider::ok("A0", Some(3600), None));

    let err = h.manager.authorize_with_code("code").await.unwrap_err();
    assert!(matches!(err, TokenError::NoCredentials));
    assert_eq!(h.stored_access().await, None);

    // Accepted once a refresh token exists from an earlier login
    h.seed_refresh("R1").await;
    h.manager.authorize_with_code("code").await.unwrap();
    assert_eq!(h.stored_access().await.as_deref(), Some("A0"));
    assert_eq!(h.stored_refresh().await.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_code_exchange_stores_both_tokens() {
    let h = harness(FakeProvider::ok("A0", Some(3600), Some("R0")));

    let response = h.manager.authorize_with_code("code").await.unwrap();
    assert_eq!(response.access_token, "A0");

    let status = h.manager.status().await.unwrap();
    assert!(status.access_token_present);
    assert!(status.refresh_token_present);
    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A0");
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn test_logout_clears_everything() {
    let h = harness(FakeProvider::ok("A1", Some(3600), None));
    h.seed_refresh("R1").await;
    h.seed_access("A0", Duration::from_secs(60)).await;

    h.manager.logout().await.unwrap();

    let status = h.manager.status().await.unwrap();
    assert!(!status.access_token_present);
    assert!(!status.refresh_token_present);
    assert!(matches!(
        h.manager.get_valid_token().await.unwrap_err(),
        TokenError::NoCredentials
    ));
}

#[tokio::test]
async fn test_dropped_caller_does_not_leave_lock_held() {
    let h = harness(
        FakeProvider::ok("A1", Some(3600), None).with_delay(Duration::from_millis(500)),
    );
    h.seed_refresh("R1").await;

    // Caller goes away while the upstream call is in flight
    let first = tokio::time::timeout(Duration::from_millis(100), h.manager.get_valid_token()).await;
    assert!(first.is_err());

    // The refresh still completes and frees the lock for the next caller
    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A1");
    assert_eq!(h.provider.calls(), 1);

    let guard = h
        .store
        .acquire_lock(REFRESH_LOCK_NAME, Duration::from_secs(5), Duration::ZERO)
        .await
        .unwrap();
    h.store.release_lock(guard).await.unwrap();
}

#[tokio::test]
async fn test_huge_expires_in_is_stored() {
    let h = harness(FakeProvider::ok("A1", Some(u64::MAX), None));
    h.seed_refresh("R1").await;

    assert_eq!(h.manager.get_valid_token().await.unwrap(), "A1");
    assert_eq!(h.stored_access().await.as_deref(), Some("A1"));
}

// Store double that can refuse one kind of write
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryCredentialStore,
    fail_access: bool,
    fail_refresh: bool,
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn put_access(&self, token: &str, ttl: Duration) -> Result<(), StoreError> {
        if self.fail_access {
            return Err(StoreError::Unavailable("access write refused".into()));
        }
        self.inner.put_access(token, ttl).await
    }

    async fn put_refresh(&self, token: &str) -> Result<(), StoreError> {
        if self.fail_refresh {
            return Err(StoreError::Unavailable("refresh write refused".into()));
        }
        self.inner.put_refresh(token).await
    }

    async fn get_access(&self) -> Result<Option<String>, StoreError> {
        self.inner.get_access().await
    }

    async fn get_refresh(&self) -> Result<Option<String>, StoreError> {
        self.inner.get_refresh().await
    }

    async fn acquire_lock(
        &self,
        name: &str,
        hold_timeout: Duration,
        wait_timeout: Duration,
    ) -> Result<LockGuard, StoreError> {
        self.inner.acquire_lock(name, hold_timeout, wait_timeout).await
    }

    async fn release_lock(&self, guard: LockGuard) -> Result<(), StoreError> {
        self.inner.release_lock(guard).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}

async fn flaky_manager(store: Arc<FlakyStore>, cipher: &TokenCipher) -> TokenManager {
    store
        .inner
        .put_refresh(&cipher.encrypt("R1").unwrap())
        .await
        .unwrap();
    TokenManager::new(
        store,
        Arc::new(FakeProvider::ok("A2", Some(3600), Some("R2"))),
        cipher.clone(),
        RefreshSettings::default(),
    )
}

#[tokio::test]
async fn test_rotated_refresh_token_survives_failed_access_write() {
    let cipher = TokenCipher::new(&[7u8; 32]);
    let store = Arc::new(FlakyStore {
        fail_access: true,
        ..FlakyStore::default()
    });
    let manager = flaky_manager(store.clone(), &cipher).await;

    let err = manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::StorageUnavailable(_)));

    let stored = store.inner.get_refresh().await.unwrap().unwrap();
    assert_eq!(cipher.decrypt(&stored).unwrap(), "R2");
}

#[tokio::test]
async fn test_failed_refresh_write_stores_no_access_token() {
    let cipher = TokenCipher::new(&[7u8; 32]);
    let store = Arc::new(FlakyStore {
        fail_refresh: true,
        ..FlakyStore::default()
    });
    let manager = flaky_manager(store.clone(), &cipher).await;

    let err = manager.get_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::StorageUnavailable(_)));
    assert_eq!(store.inner.get_access().await.unwrap(), None);
}
