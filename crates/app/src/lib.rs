#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use sharekeep_api::ApiState;
use sharekeep_auth::event_signature::EventKey;
use sharekeep_auth::jwt::{normalize_issuer, JwtVerifier, JwtVerifierConfig};
use sharekeep_core::SystemClock;
use sharekeep_ledger::{QuotaLedger, SharingService};
use sharekeep_storage::{migrate_with_pool, PostgresStorage};
use url::Url;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5380";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    /// Normalized issuer to key set URL.
    pub trusted_issuers: HashMap<String, String>,
    pub audiences: Vec<String>,
    /// Enables the storage-event route when present.
    pub storage_event_key: Option<EventKey>,
}

/// Raw configuration strings, one per environment variable.
#[derive(Debug, Clone, Default)]
pub struct ConfigValues {
    pub listen_addr: Option<String>,
    pub database_url: Option<String>,
    pub trusted_issuers: Option<String>,
    pub audiences: Option<String>,
    pub storage_event_key: Option<String>,
}

impl ConfigValues {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            listen_addr: var("LISTEN_ADDR"),
            database_url: var("DATABASE_URL"),
            trusted_issuers: var("TRUSTED_ISSUERS"),
            audiences: var("AUDIENCES"),
            storage_event_key: var("STORAGE_EVENT_KEY"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_values(ConfigValues::from_env())
    }

    pub fn from_values(values: ConfigValues) -> anyhow::Result<Self> {
        let listen_addr = values
            .listen_addr
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_LISTEN_ADDR);
        let listen_addr = SocketAddr::from_str(listen_addr)
            .map_err(|error| anyhow::anyhow!("invalid LISTEN_ADDR {listen_addr:?}: {error}"))?;
        let database_url = values
            .database_url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            listen_addr,
            database_url,
            trusted_issuers: parse_trusted_issuers(values.trusted_issuers)?,
            audiences: parse_audiences(values.audiences),
            storage_event_key: parse_event_key(values.storage_event_key)?,
        })
    }
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let storage = Arc::new(PostgresStorage::connect(&config.database_url).await?);
    migrate_with_pool(storage.pool()).await?;

    let clock = Arc::new(SystemClock);
    let validator = Arc::new(JwtVerifier::new(JwtVerifierConfig {
        trusted_issuers: config.trusted_issuers.clone(),
        audiences: config.audiences.clone(),
        ..JwtVerifierConfig::default()
    }));
    let mut state = ApiState::new(
        SharingService::new(storage.clone(), clock.clone()),
        QuotaLedger::new(storage, clock),
        validator,
    );
    match config.storage_event_key.clone() {
        Some(key) => state = state.with_event_key(key),
        None => tracing::warn!("STORAGE_EVENT_KEY not set, storage events disabled"),
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(
        addr = %config.listen_addr,
        issuers = config.trusted_issuers.len(),
        "server listening"
    );
    axum::serve(listener, sharekeep_api::router(state)).await?;
    Ok(())
}

fn parse_trusted_issuers(value: Option<String>) -> anyhow::Result<HashMap<String, String>> {
    let raw = value.unwrap_or_default();
    let mut issuers = HashMap::new();

    for entry in raw.split_whitespace() {
        let (issuer, jwks_url) = match entry.split_once('=') {
            Some((issuer, jwks_url)) => (issuer, Some(jwks_url)),
            None => (entry, None),
        };
        require_http_url(issuer, "issuer")?;
        let issuer = normalize_issuer(issuer);
        let jwks_url = match jwks_url {
            Some(url) => {
                require_http_url(url, "jwks_url")?;
                url.to_owned()
            }
            None => format!("{issuer}/.well-known/jwks.json"),
        };
        issuers.insert(issuer, jwks_url);
    }

    if issuers.is_empty() {
        anyhow::bail!("TRUSTED_ISSUERS must be set");
    }
    Ok(issuers)
}

fn parse_audiences(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_event_key(value: Option<String>) -> anyhow::Result<Option<EventKey>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(hex) => EventKey::from_hex(hex)
            .map(Some)
            .map_err(|error| anyhow::anyhow!("invalid STORAGE_EVENT_KEY: {error}")),
    }
}

fn require_http_url(raw: &str, label: &str) -> anyhow::Result<()> {
    let parsed =
        Url::parse(raw).map_err(|error| anyhow::anyhow!("invalid {label} URL {raw:?}: {error}"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => anyhow::bail!("invalid {label} URL {raw:?}: must use http or https"),
    }
}
