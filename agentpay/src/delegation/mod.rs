//! Delegated signer
//!
//! Holds the ephemeral session key and produces the two kinds of signed
//! artifacts the protocols need:
//! 1. Per-request authentication headers, signed locally with the session key
//! 2. Primary-key signatures (SIWE delegation, payment authorizations),
//!    obtained from the remote custody gateway. Hashes are computed here; the
//!    primary key never leaves custody.

pub mod keys;
pub mod message;
pub mod request_auth;

pub use keys::SessionKeypair;
pub use message::{DelegationMessageFields, build_delegation_message};
pub use request_auth::{SessionAuthHeaders, sign_request};

use std::sync::Arc;

use crate::custody::{CustodyAuth, RawHashSigner};
use crate::error::Result;
use crate::session::SessionRecord;

pub struct DelegatedSigner {
    custody: Arc<dyn RawHashSigner>,
}

impl DelegatedSigner {
    pub fn new(custody: Arc<dyn RawHashSigner>) -> Self {
        Self { custody }
    }

    /// New ephemeral keypair; one per session, never reused.
    pub fn generate_keypair(&self) -> SessionKeypair {
        SessionKeypair::generate()
    }

    pub fn build_delegation_message(&self, fields: &DelegationMessageFields) -> String {
        build_delegation_message(fields)
    }

    pub fn sign_request(
        &self,
        session: &SessionRecord,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Result<SessionAuthHeaders> {
        request_auth::sign_request(session, method, path, body)
    }

    /// Sign the EIP-191 hash of a delegation message with the primary key.
    ///
    /// Bootstrap path: no session exists yet, so the custody call is scoped
    /// to the wallet address only.
    pub async fn sign_delegation(&self, wallet_id: &str, address: &str, message: &str) -> Result<String> {
        let hash = ethers::utils::hash_message(message);
        log::info!("[DELEGATION] Requesting delegation signature for {}", address);
        self.custody
            .sign_raw_hash(wallet_id, hash.as_fixed_bytes(), CustodyAuth::Bootstrap { address })
            .await
    }

    /// Sign a pre-computed EIP-712 payment digest with the primary key over
    /// a session-authenticated channel.
    pub async fn sign_payment(
        &self,
        typed_data_hash: &[u8; 32],
        session: &SessionRecord,
        wallet_id: &str,
    ) -> Result<String> {
        log::info!(
            "[DELEGATION] Requesting payment signature via session {}",
            session.session_id
        );
        self.custody
            .sign_raw_hash(wallet_id, typed_data_hash, CustodyAuth::Session(session))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers with a fixed signature
    #[derive(Default)]
    struct RecordingCustody {
        calls: Mutex<Vec<(String, [u8; 32], Option<String>)>>,
    }

    #[async_trait]
    impl RawHashSigner for RecordingCustody {
        async fn sign_raw_hash(&self, wallet_id: &str, hash: &[u8; 32], auth: CustodyAuth<'_>) -> Result<String> {
            let session_id = match auth {
                CustodyAuth::Bootstrap { .. } => None,
                CustodyAuth::Session(s) => Some(s.session_id.clone()),
            };
            self.calls.lock().unwrap().push((wallet_id.to_string(), *hash, session_id));
            Ok(format!("0x{}1b", "ab".repeat(64)))
        }
    }

    struct RefusingCustody;

    #[async_trait]
    impl RawHashSigner for RefusingCustody {
        async fn sign_raw_hash(&self, _: &str, _: &[u8; 32], _: CustodyAuth<'_>) -> Result<String> {
            Err(Error::DelegationSignFailed {
                status: reqwest::StatusCode::FORBIDDEN,
                body: "wallet locked".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_delegation_uses_bootstrap_and_eip191_hash() {
        let custody = Arc::new(RecordingCustody::default());
        let signer = DelegatedSigner::new(custody.clone());

        signer.sign_delegation("w1", "0xabc", "hello").await.unwrap();

        let calls = custody.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "w1");
        assert_eq!(calls[0].1, ethers::utils::hash_message("hello").to_fixed_bytes());
        assert!(calls[0].2.is_none());
    }

    #[tokio::test]
    async fn test_payment_uses_session_channel() {
        let custody = Arc::new(RecordingCustody::default());
        let signer = DelegatedSigner::new(custody.clone());
        let session = SessionRecord::new("sess-9", "0xabc", &signer.generate_keypair(), 1, 0);

        let hash = [7u8; 32];
        signer.sign_payment(&hash, &session, "w1").await.unwrap();

        let calls = custody.calls.lock().unwrap();
        assert_eq!(calls[0].1, hash);
        assert_eq!(calls[0].2.as_deref(), Some("sess-9"));
    }

    #[tokio::test]
    async fn test_custody_refusal_propagates() {
        let signer = DelegatedSigner::new(Arc::new(RefusingCustody));
        let err = signer.sign_delegation("w1", "0xabc", "m").await.unwrap_err();
        assert!(matches!(err, Error::DelegationSignFailed { .. }));
        assert!(err.to_string().contains("wallet locked"));
    }
}
