//! Test doubles shared by the session and payment tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentpay_types::{CreateSessionRequest, CreateSessionResponse};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;

use crate::crypto;
use crate::custody::{CustodyAuth, RawHashSigner, SessionIssuer};
use crate::delegation::SessionKeypair;
use crate::error::{Error, Result};

/// Stands in for the custody gateway. Holds a local "primary" key so every
/// signature it returns is real and recoverable.
pub struct MockCustody {
    primary: SessionKeypair,
    pub session_ttl_ms: i64,
    pub reject_sessions: bool,
    pub nonce_delay: Option<Duration>,
    pub nonce_calls: AtomicUsize,
    pub bootstrap_sign_calls: AtomicUsize,
    pub session_sign_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub created: Mutex<Vec<CreateSessionRequest>>,
    pub signed_hashes: Mutex<Vec<[u8; 32]>>,
}

impl MockCustody {
    pub fn new() -> Self {
        Self {
            // Hardhat account #1
            primary: SessionKeypair::from_private_key_hex(
                "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
            )
            .unwrap(),
            session_ttl_ms: 60 * 60 * 1000,
            reject_sessions: false,
            nonce_delay: None,
            nonce_calls: AtomicUsize::new(0),
            bootstrap_sign_calls: AtomicUsize::new(0),
            session_sign_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
            signed_hashes: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> String {
        format!("{:?}", self.primary.address())
    }

    pub fn total_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
            + self.bootstrap_sign_calls.load(Ordering::SeqCst)
            + self.session_sign_calls.load(Ordering::SeqCst)
            + self.create_calls.load(Ordering::SeqCst)
    }

    pub fn signing_calls(&self) -> usize {
        self.bootstrap_sign_calls.load(Ordering::SeqCst) + self.session_sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RawHashSigner for MockCustody {
    async fn sign_raw_hash(&self, _wallet_id: &str, hash: &[u8; 32], auth: CustodyAuth<'_>) -> Result<String> {
        match auth {
            CustodyAuth::Bootstrap { .. } => self.bootstrap_sign_calls.fetch_add(1, Ordering::SeqCst),
            CustodyAuth::Session(_) => self.session_sign_calls.fetch_add(1, Ordering::SeqCst),
        };
        self.signed_hashes.lock().unwrap().push(*hash);
        self.primary.sign_hash(hash)
    }
}

#[async_trait]
impl SessionIssuer for MockCustody {
    async fn fetch_nonce(&self) -> Result<String> {
        let n = self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.nonce_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("nonce{}", n))
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<CreateSessionResponse> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.created.lock().unwrap().push(CreateSessionRequest {
            siwe_message: request.siwe_message.clone(),
            signature: request.signature.clone(),
            session_public_key: request.session_public_key.clone(),
        });

        if self.reject_sessions {
            return Err(Error::SessionRejected {
                status: StatusCode::UNAUTHORIZED,
                body: "invalid delegation".to_string(),
            });
        }

        // Like a real verifier: recover the signer from the SIWE signature
        let hash = ethers::utils::hash_message(&request.siwe_message);
        let signer = crypto::recover_address(hash.as_fixed_bytes(), &request.signature)?;

        Ok(CreateSessionResponse {
            session_id: format!("sess-{}", n),
            address: format!("{:?}", signer),
            expires_at: Utc::now().timestamp_millis() + self.session_ttl_ms,
        })
    }
}

/// Serve an axum router on an ephemeral localhost port; returns its base URL.
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
