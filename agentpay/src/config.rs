use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::session::DelegationSettings;

/// Environment variables read by [`Config::from_env`]
pub mod env_vars {
    pub const GATEWAY_URL: &str = "AGENTPAY_GATEWAY_URL";
    pub const HOME: &str = "AGENTPAY_HOME";
    pub const SIWE_DOMAIN: &str = "AGENTPAY_SIWE_DOMAIN";
    pub const SIWE_URI: &str = "AGENTPAY_SIWE_URI";
    pub const CHAIN_ID: &str = "AGENTPAY_CHAIN_ID";
    pub const SESSION_TTL_SECS: &str = "AGENTPAY_SESSION_TTL_SECS";
    pub const REQUEST_TIMEOUT_SECS: &str = "AGENTPAY_REQUEST_TIMEOUT_SECS";
}

pub const DEFAULT_CHAIN_ID: u64 = 8453;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_url: String,
    /// Holds `wallet.json` and `session.json`
    pub home_dir: PathBuf,
    pub siwe_domain: String,
    pub siwe_uri: String,
    pub chain_id: u64,
    pub session_ttl: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Defaults for everything except the gateway URL.
    pub fn new(gateway_url: &str, home_dir: impl Into<PathBuf>) -> Result<Self> {
        let url = Url::parse(gateway_url)
            .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", env_vars::GATEWAY_URL, gateway_url, e)))?;
        let domain = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(Error::Config(format!("Gateway URL '{}' has no host", gateway_url)));
            }
        };

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            home_dir: home_dir.into(),
            siwe_domain: domain,
            siwe_uri: url.origin().ascii_serialization(),
            chain_id: DEFAULT_CHAIN_ID,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let gateway_url = lookup(env_vars::GATEWAY_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} not set", env_vars::GATEWAY_URL)))?;

        let home_dir = match lookup(env_vars::HOME) {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => lookup("HOME")
                .map(|home| PathBuf::from(home).join(".agentpay"))
                .ok_or_else(|| Error::Config(format!("Neither {} nor HOME is set", env_vars::HOME)))?,
        };

        let mut config = Self::new(&gateway_url, home_dir)?;

        if let Some(domain) = lookup(env_vars::SIWE_DOMAIN) {
            config.siwe_domain = domain;
        }
        if let Some(uri) = lookup(env_vars::SIWE_URI) {
            config.siwe_uri = uri;
        }
        if let Some(chain_id) = lookup(env_vars::CHAIN_ID) {
            config.chain_id = parse_number(env_vars::CHAIN_ID, &chain_id)?;
        }
        if let Some(ttl) = lookup(env_vars::SESSION_TTL_SECS) {
            config.session_ttl = Duration::from_secs(parse_number(env_vars::SESSION_TTL_SECS, &ttl)?);
        }
        if let Some(timeout) = lookup(env_vars::REQUEST_TIMEOUT_SECS) {
            let secs = parse_number(env_vars::REQUEST_TIMEOUT_SECS, &timeout)?;
            config.request_timeout = Duration::from_secs(secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS));
        }

        Ok(config)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.home_dir.join("wallet.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.home_dir.join("session.json")
    }

    pub fn delegation_settings(&self) -> DelegationSettings {
        DelegationSettings {
            domain: self.siwe_domain.clone(),
            uri: self.siwe_uri.clone(),
            chain_id: self.chain_id,
            session_ttl: self.session_ttl,
        }
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a valid number, got '{}'", name, value)))
}
