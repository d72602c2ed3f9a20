use std::sync::Arc;
use std::time::Duration;

use agentpay_types::CreateSessionRequest;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{SessionRecord, SessionStore};
use crate::custody::SessionIssuer;
use crate::delegation::{DelegatedSigner, DelegationMessageFields};
use crate::error::{Error, Result};

/// Values embedded in every SIWE delegation message
#[derive(Debug, Clone)]
pub struct DelegationSettings {
    pub domain: String,
    pub uri: String,
    pub chain_id: u64,
    /// Requested lifetime; the gateway has the final say via `expiresAt`
    pub session_ttl: Duration,
}

/// Hands out a currently-valid delegated session, establishing one when the
/// persisted record is missing, expired, or for another address.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    issuer: Arc<dyn SessionIssuer>,
    signer: Arc<DelegatedSigner>,
    settings: DelegationSettings,
    /// Single-flight gate: one establishment round trip per overlap window
    renewal: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        issuer: Arc<dyn SessionIssuer>,
        signer: Arc<DelegatedSigner>,
        settings: DelegationSettings,
    ) -> Self {
        Self {
            store,
            issuer,
            signer,
            settings,
            renewal: Mutex::new(()),
        }
    }

    async fn usable_session(&self, address: &str) -> Result<Option<SessionRecord>> {
        Ok(self
            .store
            .load()
            .await?
            .filter(|s| s.belongs_to(address) && s.is_usable()))
    }

    /// Return the persisted session if it is still usable, otherwise
    /// establish (and persist) a new one.
    pub async fn get_session(&self, wallet_id: &str, address: &str) -> Result<SessionRecord> {
        if let Some(session) = self.usable_session(address).await? {
            return Ok(session);
        }

        let _guard = self.renewal.lock().await;

        // A concurrent caller may have finished establishing while we waited
        if let Some(session) = self.usable_session(address).await? {
            log::debug!("[SESSION] Reusing session {} established concurrently", session.session_id);
            return Ok(session);
        }

        self.establish(wallet_id, address).await
    }

    /// Run the full establishment sequence: nonce, delegation signature,
    /// session creation, persistence.
    pub async fn establish(&self, wallet_id: &str, address: &str) -> Result<SessionRecord> {
        log::info!("[SESSION] Establishing delegated session for {}", address);

        let nonce = self.issuer.fetch_nonce().await?;

        let keypair = self.signer.generate_keypair();
        let session_public_key = keypair.public_key_hex();

        let issued_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.settings.session_ttl)
            .map_err(|e| Error::Config(format!("Session TTL out of range: {}", e)))?;

        let message = self.signer.build_delegation_message(&DelegationMessageFields {
            domain: self.settings.domain.clone(),
            address: address.to_string(),
            session_public_key: session_public_key.clone(),
            uri: self.settings.uri.clone(),
            chain_id: self.settings.chain_id,
            nonce,
            issued_at,
            expiration_time: issued_at + ttl,
        });
        log::debug!("[SESSION] Delegation message:\n{}", message);

        let signature = self.signer.sign_delegation(wallet_id, address, &message).await?;

        let created = self
            .issuer
            .create_session(&CreateSessionRequest {
                siwe_message: message,
                signature,
                session_public_key,
            })
            .await?;

        if !created.address.eq_ignore_ascii_case(address) {
            return Err(Error::ProtocolViolation(format!(
                "Session issued for {} but {} was requested",
                created.address, address
            )));
        }

        let record = SessionRecord::new(
            created.session_id,
            address,
            &keypair,
            created.expires_at,
            issued_at.timestamp_millis(),
        );

        if !record.is_usable() {
            log::warn!(
                "[SESSION] Session {} expires at {} which is inside the renewal buffer",
                record.session_id,
                record.expires_at
            );
        }

        self.store.save(&record).await?;

        log::info!(
            "[SESSION] Session {} established for {} (expires at {})",
            record.session_id,
            record.address,
            record.expires_at
        );
        Ok(record)
    }
}
