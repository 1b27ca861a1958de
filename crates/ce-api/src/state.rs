//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! - **Repository**: clients, submissions, tasks and accounts, held in memory
//!   and written through to PostgreSQL when a pool is configured.
//! - **Sessions** and **OTP challenges**: memory only.
//! - **Filings**: wizards in progress, memory only. A restart drops them, a
//!   recorded filing is removed, and one idle past `filing_ttl_secs` is swept.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::PgPool;

use ce_core::{ClientId, FilingId, Timestamp};
use ce_state::{GstReturnWizard, IncomeTaxWizard};

use crate::accounts::{bootstrap_admin, AccountDirectory};
use crate::auth::SessionRegistry;
use crate::otp::{LogOtpSender, OtpChallenges, OtpSender};
use crate::repository::Repository;
use crate::store::MemoryStore;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot` and is never held across `.await`.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Eq + Hash, T: Clone> Store<K, T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`.
    pub fn try_update<R, E>(
        &self,
        id: &K,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Run `f` on a record and drop the record when `f` asks to, all under
    /// one write guard. `f` returns its result and whether to remove.
    pub fn update_or_remove<R>(&self, id: &K, f: impl FnOnce(&mut T) -> (R, bool)) -> Option<R> {
        let mut guard = self.data.write();
        let (result, remove) = f(guard.get_mut(id)?);
        if remove {
            guard.remove(id);
        }
        Some(result)
    }

    /// Drop every record for which `keep` returns false. Returns how many
    /// were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut guard = self.data.write();
        let before = guard.len();
        guard.retain(|_, v| keep(v));
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, T: Clone> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Filing Records -----------------------------------------------------------

/// A filing wizard in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filing {
    GstReturn(GstReturnWizard),
    IncomeTax(IncomeTaxWizard),
}

impl Filing {
    pub fn id(&self) -> FilingId {
        match self {
            Self::GstReturn(w) => w.id,
            Self::IncomeTax(w) => w.id,
        }
    }

    pub fn client_id(&self) -> ClientId {
        match self {
            Self::GstReturn(w) => w.client_id,
            Self::IncomeTax(w) => w.client_id,
        }
    }

    /// Name of the current step.
    pub fn step(&self) -> &'static str {
        match self {
            Self::GstReturn(w) => w.step.as_str(),
            Self::IncomeTax(w) => w.step.as_str(),
        }
    }

    pub fn is_complete(&self) -> bool {
        match self {
            Self::GstReturn(w) => w.is_complete(),
            Self::IncomeTax(w) => w.is_complete(),
        }
    }

    /// Time of the last action.
    pub fn updated_at(&self) -> Timestamp {
        match self {
            Self::GstReturn(w) => w.updated_at,
            Self::IncomeTax(w) => w.updated_at,
        }
    }
}

// -- Configuration ------------------------------------------------------------

/// Default session lifetime: 12 hours.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
/// Default OTP challenge lifetime: 5 minutes.
pub const DEFAULT_OTP_TTL_SECS: u64 = 5 * 60;
/// Default idle lifetime of a filing wizard: 24 hours.
pub const DEFAULT_FILING_TTL_SECS: u64 = 24 * 60 * 60;
/// Default decoded document size limit: 5 MiB.
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Service configuration, read from `CE_*` environment variables.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    pub session_ttl_secs: u64,
    pub otp_ttl_secs: u64,
    /// Idle time after which an unfinished filing wizard is dropped.
    pub filing_ttl_secs: u64,
    /// Return the OTP code in the issue response. Development and tests only.
    pub otp_echo: bool,
    /// Maximum decoded size of one uploaded document.
    pub max_document_bytes: usize,
    pub admin_username: Option<String>,
    /// Argon2 PHC string for the bootstrap admin.
    pub admin_password_hash: Option<String>,
    /// Legacy browser-storage export loaded into the store at startup.
    pub seed_file: Option<PathBuf>,
    pub log_json: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("otp_ttl_secs", &self.otp_ttl_secs)
            .field("filing_ttl_secs", &self.filing_ttl_secs)
            .field("otp_echo", &self.otp_echo)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password_hash",
                &self.admin_password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field("seed_file", &self.seed_file)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
            filing_ttl_secs: DEFAULT_FILING_TTL_SECS,
            otp_echo: false,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            admin_username: None,
            admin_password_hash: None,
            seed_file: None,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Invalid numeric or boolean
    /// values fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            port: parse_or(&lookup, "CE_PORT", defaults.port),
            session_ttl_secs: parse_or(&lookup, "CE_SESSION_TTL_SECS", defaults.session_ttl_secs),
            otp_ttl_secs: parse_or(&lookup, "CE_OTP_TTL_SECS", defaults.otp_ttl_secs),
            filing_ttl_secs: parse_or(&lookup, "CE_FILING_TTL_SECS", defaults.filing_ttl_secs),
            otp_echo: parse_or(&lookup, "CE_OTP_ECHO", defaults.otp_echo),
            max_document_bytes: parse_or(
                &lookup,
                "CE_MAX_DOCUMENT_BYTES",
                defaults.max_document_bytes,
            ),
            admin_username: non_empty("CE_ADMIN_USERNAME"),
            admin_password_hash: non_empty("CE_ADMIN_PASSWORD_HASH"),
            seed_file: non_empty("CE_SEED_FILE").map(PathBuf::from),
            log_json: parse_or(&lookup, "CE_LOG_JSON", defaults.log_json),
        }
    }

    /// Request body limit: base64 inflates by 4/3, plus room for the rest
    /// of the JSON envelope.
    pub fn max_body_bytes(&self) -> usize {
        self.max_document_bytes
            .saturating_mul(4)
            .saturating_div(3)
            .saturating_add(64 * 1024)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "invalid configuration value, using default");
                default
            }
        },
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state. Cloning is cheap; all stores are `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub sessions: SessionRegistry,
    pub otp: OtpChallenges,
    pub filings: Store<FilingId, Filing>,
    /// Prometheus render handle. `None` when no recorder is installed
    /// (tests), in which case `/metrics` answers 503.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("database", &self.repo.pool().is_some())
            .field("sessions", &self.sessions.len())
            .field("filings", &self.filings.len())
            .finish()
    }
}

impl AppState {
    /// In-memory state with the default OTP sender.
    pub fn new(config: AppConfig) -> Self {
        Self::with_parts(config, None, Arc::new(LogOtpSender), None)
    }

    /// State with every collaborator supplied.
    ///
    /// The bootstrap admin from the configuration is added to the account
    /// directory here; a malformed hash is logged and skipped.
    pub fn with_parts(
        config: AppConfig,
        db_pool: Option<PgPool>,
        otp_sender: Arc<dyn OtpSender>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let accounts = AccountDirectory::new();
        if let Some(admin) = bootstrap_admin(&config) {
            tracing::info!(username = %admin.login, "bootstrap admin account configured");
            accounts.upsert(admin);
        }
        let repo = Repository::new(MemoryStore::new(), accounts, db_pool);
        Self {
            sessions: SessionRegistry::new(config.session_ttl_secs),
            otp: OtpChallenges::new(config.otp_ttl_secs, otp_sender),
            filings: Store::new(),
            repo,
            metrics,
            config: Arc::new(config),
        }
    }

    /// Drop filing wizards idle for longer than the configured TTL.
    pub fn purge_stale_filings(&self) -> usize {
        let now = Timestamp::now();
        let ttl = self.config.filing_ttl_secs;
        self.filings.retain(|f| now < f.updated_at().plus_secs(ttl))
    }

    /// Load persisted records into memory. No-op without a database.
    pub async fn hydrate_from_db(&self) -> Result<(), sqlx::Error> {
        self.repo.hydrate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_secs, 43_200);
        assert_eq!(config.otp_ttl_secs, 300);
        assert_eq!(config.filing_ttl_secs, 86_400);
        assert!(!config.otp_echo);
        assert_eq!(config.max_document_bytes, 5_242_880);
        assert!(config.admin_username.is_none());
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn config_reads_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CE_PORT", "9090"),
            ("CE_OTP_ECHO", "true"),
            ("CE_SESSION_TTL_SECS", "60"),
            ("CE_FILING_TTL_SECS", "3600"),
            ("CE_SEED_FILE", "/tmp/export.json"),
            ("CE_ADMIN_USERNAME", "root"),
        ]));
        assert_eq!(config.port, 9090);
        assert!(config.otp_echo);
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.filing_ttl_secs, 3600);
        assert_eq!(config.seed_file, Some(PathBuf::from("/tmp/export.json")));
        assert_eq!(config.admin_username.as_deref(), Some("root"));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("CE_PORT", "eighty"),
            ("CE_MAX_DOCUMENT_BYTES", "-1"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_document_bytes, DEFAULT_MAX_DOCUMENT_BYTES);
    }

    #[test]
    fn debug_redacts_admin_hash() {
        let config = AppConfig {
            admin_password_hash: Some("$argon2id$secret".into()),
            ..AppConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn body_limit_covers_base64_document() {
        let config = AppConfig::default();
        assert!(config.max_body_bytes() > config.max_document_bytes * 4 / 3);
    }

    #[test]
    fn store_try_update_and_retain() {
        let store: Store<u32, i64> = Store::new();
        store.insert(1, 10);
        store.insert(2, 20);
        let res = store.try_update(&1, |v| {
            *v += 1;
            Ok::<_, ()>(*v)
        });
        assert_eq!(res, Some(Ok(11)));
        assert_eq!(store.try_update(&9, |_| Ok::<_, ()>(())), None);
        assert_eq!(store.retain(|v| *v > 15), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&2), Some(20));
    }

    #[test]
    fn store_update_or_remove() {
        let store: Store<u32, i64> = Store::new();
        store.insert(1, 10);
        assert_eq!(store.update_or_remove(&1, |v| { *v += 1; (*v, false) }), Some(11));
        assert_eq!(store.get(&1), Some(11));
        assert_eq!(store.update_or_remove(&1, |v| (*v, true)), Some(11));
        assert!(store.is_empty());
        assert_eq!(store.update_or_remove(&1, |v| (*v, true)), None);
    }

    #[test]
    fn stale_filings_are_purged() {
        let client = ClientId::new();
        let idle = AppState::new(AppConfig {
            filing_ttl_secs: 0,
            ..AppConfig::default()
        });
        let filing = Filing::GstReturn(GstReturnWizard::new(client));
        idle.filings.insert(filing.id(), filing);
        assert_eq!(idle.purge_stale_filings(), 1);
        assert!(idle.filings.is_empty());

        let fresh = AppState::new(AppConfig::default());
        let filing = Filing::IncomeTax(IncomeTaxWizard::new(client));
        fresh.filings.insert(filing.id(), filing);
        assert_eq!(fresh.purge_stale_filings(), 0);
        assert_eq!(fresh.filings.len(), 1);
    }
}
