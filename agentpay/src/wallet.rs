//! Wallet record written by the setup flow; read-only here.

use std::path::Path;

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub address: String,
    pub wallet_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::Config(format!(
                "No wallet at {} ({}); create one with the setup flow first",
                path.display(),
                e
            ))
        })?;
        let record: WalletRecord = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("Invalid wallet file {}: {}", path.display(), e)))?;
        record.parsed_address()?;
        Ok(record)
    }

    pub fn parsed_address(&self) -> Result<Address> {
        self.address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid wallet address '{}': {}", self.address, e)))
    }
}
