use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::delegation::SessionKeypair;
use crate::error::Result;

/// A session is only handed out while it has at least this long left
pub const RENEWAL_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Persisted delegated session. Replaced wholesale on renewal, never patched.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub address: String,
    /// Hex, `0x`-prefixed
    pub session_private_key: String,
    /// Uncompressed SEC1 hex, `0x04`-prefixed
    pub session_public_key: String,
    /// Unix milliseconds
    pub expires_at: i64,
    /// Unix milliseconds
    pub created_at: i64,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("address", &self.address)
            .field("session_public_key", &self.session_public_key)
            .field("expires_at", &self.expires_at)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SessionRecord {
    pub fn new(
        session_id: impl Into<String>,
        address: impl Into<String>,
        keypair: &SessionKeypair,
        expires_at: i64,
        created_at: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            address: address.into(),
            session_private_key: keypair.private_key_hex(),
            session_public_key: keypair.public_key_hex(),
            expires_at,
            created_at,
        }
    }

    pub fn keypair(&self) -> Result<SessionKeypair> {
        SessionKeypair::from_private_key_hex(&self.session_private_key)
    }

    /// Usable only while `expires_at` is beyond `now + RENEWAL_BUFFER_MS`
    pub fn is_usable_at(&self, now_ms: i64) -> bool {
        self.expires_at > now_ms.saturating_add(RENEWAL_BUFFER_MS)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now().timestamp_millis())
    }

    pub fn belongs_to(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}
