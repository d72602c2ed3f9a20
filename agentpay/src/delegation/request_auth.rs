//! Per-request authentication with the delegated session key
//!
//! Every gateway call made once a session exists carries a signature over a
//! six-line canonical message:
//!
//! ```text
//! AGENTPAY-SESSION-V1
//! {METHOD}
//! {PATH}
//! sha256:{bodyDigestHex}
//! {unixTimestampSeconds}
//! {nonce}
//! ```
//!
//! The message is SHA-256 hashed and signed with the session private key.
//! The verifier rebuilds it from the request line, the body and the headers
//! below, then recovers the session key from the signature.

use chrono::Utc;
use reqwest::RequestBuilder;

use crate::crypto;
use crate::error::Result;
use crate::session::SessionRecord;

/// First line of every canonical request message
pub const PROTOCOL_TAG: &str = "AGENTPAY-SESSION-V1";

/// Header names carried by authenticated requests
pub mod headers {
    pub const ADDRESS: &str = "X-Agentpay-Address";
    pub const SESSION_ID: &str = "X-Agentpay-Session";
    pub const SIGNATURE: &str = "X-Agentpay-Signature";
    pub const TIMESTAMP: &str = "X-Agentpay-Timestamp";
    pub const NONCE: &str = "X-Agentpay-Nonce";
}

/// Headers produced by signing one request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAuthHeaders {
    pub address: String,
    pub session_id: String,
    /// `0x`-prefixed 65-byte signature over the canonical message hash
    pub signature: String,
    pub timestamp: i64,
    pub nonce: String,
}

impl SessionAuthHeaders {
    pub fn to_pairs(&self) -> [(&'static str, String); 5] {
        [
            (headers::ADDRESS, self.address.clone()),
            (headers::SESSION_ID, self.session_id.clone()),
            (headers::SIGNATURE, self.signature.clone()),
            (headers::TIMESTAMP, self.timestamp.to_string()),
            (headers::NONCE, self.nonce.clone()),
        ]
    }

    pub fn apply(&self, mut builder: RequestBuilder) -> RequestBuilder {
        for (name, value) in self.to_pairs() {
            builder = builder.header(name, value);
        }
        builder
    }
}

/// Build the canonical six-line message for a request.
pub fn canonical_message(method: &str, path: &str, body: &[u8], timestamp: i64, nonce: &str) -> String {
    format!(
        "{}\n{}\n{}\nsha256:{}\n{}\n{}",
        PROTOCOL_TAG,
        method.to_uppercase(),
        path,
        crypto::digest_hex(body),
        timestamp,
        nonce,
    )
}

/// Sign a request with a fresh timestamp and nonce.
pub fn sign_request(
    session: &SessionRecord,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<SessionAuthHeaders> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    sign_request_with(session, method, path, body, Utc::now().timestamp(), &nonce)
}

/// Sign a request with caller-supplied timestamp and nonce.
pub fn sign_request_with(
    session: &SessionRecord,
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: i64,
    nonce: &str,
) -> Result<SessionAuthHeaders> {
    let message = canonical_message(method, path, body, timestamp, nonce);
    log::debug!("[DELEGATION] Canonical request message:\n{}", message);

    let hash = crypto::digest(message.as_bytes());
    let signature = session.keypair()?.sign_hash(&hash)?;

    Ok(SessionAuthHeaders {
        address: session.address.clone(),
        session_id: session.session_id.clone(),
        signature,
        timestamp,
        nonce: nonce.to_string(),
    })
}
