//! Configuration management for the broadcast backend.
//!
//! Values come from environment variables, optionally seeded from `.env`
//! files. The configuration is read once at startup into a [`Config`] value
//! which is handed to the components that need it; nothing reads the
//! environment at request time.
//!
//! The lookup order is:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the working directory
//! 3. `.env` file in the local data directory
//! 4. Application defaults (where applicable)

use std::{env, fmt, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::{crypto::TokenCipher, error::ConfigError};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SERVER_ADDRESS: ([u8; 4], u16) = ([0, 0, 0, 0], 8000);
pub const DEFAULT_SCOPE: &str = "user-read-playback-state user-read-currently-playing \
user-read-recently-played user-top-read user-read-email user-read-private playlist-read-private";

/// Loads `.env` files into the process environment.
///
/// The file in the working directory is read first so it wins over the one
/// in the platform data directory (`~/.local/share/spotify-broadcast/.env`
/// on Linux). Neither file has to exist; variables already present in the
/// environment are never overwritten.
pub async fn load_env() -> Result<(), String> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotify-broadcast/.env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if let Err(e) = dotenv::dotenv() {
        if !e.not_found() {
            return Err(e.to_string());
        }
    }
    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    /// False for the in-memory store, whose contents vanish with the process
    /// that wrote them.
    pub fn is_shared(&self) -> bool {
        matches!(self, StoreBackend::Redis)
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown credential store '{other}', expected redis or memory")),
        }
    }
}

/// Spotify application credentials and endpoints.
#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub server_address: SocketAddr,
    pub store: StoreBackend,
    pub redis_url: Option<String>,
    pub cipher: TokenCipher,
    /// Lifetime assumed when the token endpoint omits `expires_in`.
    pub default_expires_in: Duration,
    pub lock_hold: Duration,
    pub lock_wait: Duration,
    pub http_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("spotify", &self.spotify)
            .field("server_address", &self.server_address)
            .field("store", &self.store)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("cipher", &self.cipher)
            .field("default_expires_in", &self.default_expires_in)
            .field("lock_hold", &self.lock_hold)
            .field("lock_wait", &self.lock_wait)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let spotify = SpotifyConfig {
            client_id: vars.required("SPOTIFY_API_AUTH_CLIENT_ID")?,
            client_secret: vars.required("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
            redirect_uri: vars.required("SPOTIFY_API_REDIRECT_URI")?,
            scope: vars.or("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            auth_url: vars.or("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: vars.or("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: vars
                .or("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
        };

        let cipher = TokenCipher::from_base64_key(&vars.required("TOKEN_ENCRYPTION_KEY")?)
            .map_err(|e| ConfigError::Invalid {
                name: "TOKEN_ENCRYPTION_KEY".to_string(),
                message: e.to_string(),
            })?;

        let store: StoreBackend = vars.parse("CREDENTIAL_STORE", StoreBackend::Redis)?;
        let redis_url = vars.optional("REDIS_URL");
        if store == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL".to_string()));
        }

        let lock_hold = Duration::from_secs(vars.parse("REFRESH_LOCK_HOLD_SECS", 30)?);
        let http_timeout = Duration::from_secs(vars.parse("HTTP_TIMEOUT_SECS", 10)?);
        if http_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        // A refresh may take up to the HTTP timeout; the lock has to outlive it.
        if lock_hold <= http_timeout {
            return Err(ConfigError::Invalid {
                name: "REFRESH_LOCK_HOLD_SECS".to_string(),
                message: format!(
                    "must be greater than HTTP_TIMEOUT_SECS ({}s), got {}s",
                    http_timeout.as_secs(),
                    lock_hold.as_secs()
                ),
            });
        }

        Ok(Self {
            spotify,
            server_address: vars.parse("SERVER_ADDRESS", SocketAddr::from(DEFAULT_SERVER_ADDRESS))?,
            store,
            redis_url,
            cipher,
            default_expires_in: Duration::from_secs(vars.parse("TOKEN_DEFAULT_EXPIRES_IN", 3600)?),
            lock_hold,
            lock_wait: Duration::from_secs(vars.parse("REFRESH_LOCK_WAIT_SECS", 5)?),
            http_timeout,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                message: e.to_string(),
            }),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::crypto::generate_key;

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("SPOTIFY_API_AUTH_CLIENT_ID", "client-id".to_string()),
            ("SPOTIFY_API_AUTH_CLIENT_SECRET", "client-secret".to_string()),
            (
                "SPOTIFY_API_REDIRECT_URI",
                "http://localhost:8000/callback".to_string(),
            ),
            ("TOKEN_ENCRYPTION_KEY", generate_key()),
            ("REDIS_URL", "redis://127.0.0.1:6379".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.spotify.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.spotify.api_url, DEFAULT_API_URL);
        assert_eq!(config.store, StoreBackend::Redis);
        assert_eq!(config.default_expires_in, Duration::from_secs(3600));
        assert_eq!(config.lock_hold, Duration::from_secs(30));
        assert_eq!(config.lock_wait, Duration::from_secs(5));
        assert_eq!(config.server_address.port(), 8000);
    }

    #[test]
    fn missing_encryption_key_is_fatal() {
        let mut vars = base_vars();
        vars.remove("TOKEN_ENCRYPTION_KEY");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(name) if name == "TOKEN_ENCRYPTION_KEY"));
    }

    #[test]
    fn malformed_encryption_key_is_fatal() {
        let mut vars = base_vars();
        vars.insert("TOKEN_ENCRYPTION_KEY", "c2hvcnQ=".to_string());
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name, .. } if name == "TOKEN_ENCRYPTION_KEY"
        ));
    }

    #[test]
    fn redis_store_requires_url() {
        let mut vars = base_vars();
        vars.remove("REDIS_URL");
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Missing(_)));

        vars.insert("CREDENTIAL_STORE", "memory".to_string());
        assert_eq!(load(&vars).unwrap().store, StoreBackend::Memory);
    }

    #[test]
    fn overrides_default_expiry_and_rejects_garbage() {
        let mut vars = base_vars();
        vars.insert("TOKEN_DEFAULT_EXPIRES_IN", "1800".to_string());
        vars.insert("SPOTIFY_API_URL", "http://localhost:9000/v1/".to_string());
        let config = load(&vars).unwrap();
        assert_eq!(config.default_expires_in, Duration::from_secs(1800));
        assert_eq!(config.spotify.api_url, "http://localhost:9000/v1");

        vars.insert("REFRESH_LOCK_WAIT_SECS", "soon".to_string());
        assert!(matches!(load(&vars).unwrap_err(), ConfigError::Invalid { .. }));
    }

    #[test]
    fn lock_hold_must_outlast_http_timeout() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECS", "30".to_string());
        vars.insert("REFRESH_LOCK_HOLD_SECS", "30".to_string());
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name, .. } if name == "REFRESH_LOCK_HOLD_SECS"
        ));

        vars.insert("REFRESH_LOCK_HOLD_SECS", "0".to_string());
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name, .. } if name == "REFRESH_LOCK_HOLD_SECS"
        ));

        vars.insert("REFRESH_LOCK_HOLD_SECS", "31".to_string());
        assert_eq!(load(&vars).unwrap().lock_hold, Duration::from_secs(31));
    }

    #[test]
    fn zero_http_timeout_is_rejected() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECS", "0".to_string());
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { name, .. } if name == "HTTP_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn only_redis_is_shared_between_processes() {
        assert!(StoreBackend::Redis.is_shared());
        assert!(!StoreBackend::Memory.is_shared());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = load(&base_vars()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("client-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
