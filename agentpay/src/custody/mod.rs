//! Remote custody capabilities
//!
//! The wallet's primary key lives in a remote custody service. The protocol
//! code only needs two narrow capabilities from it:
//!
//! - [`RawHashSigner`]: sign a 32-byte hash with the primary key
//! - [`SessionIssuer`]: hand out SIWE nonces and create delegated sessions
//!
//! [`GatewayClient`] implements both against the custody gateway's HTTP API.

mod gateway;

pub use gateway::GatewayClient;

use agentpay_types::{CreateSessionRequest, CreateSessionResponse};
use async_trait::async_trait;

use crate::error::Result;
use crate::session::SessionRecord;

/// How a sign-raw call proves who is asking
#[derive(Debug, Clone, Copy)]
pub enum CustodyAuth<'a> {
    /// Before a session exists: scoped to the wallet address only
    Bootstrap { address: &'a str },
    /// Signed with the delegated session key
    Session(&'a SessionRecord),
}

#[async_trait]
pub trait RawHashSigner: Send + Sync {
    /// Sign `hash` with the wallet's primary key. Returns a normalised
    /// `0x`-prefixed 65-byte signature.
    async fn sign_raw_hash(&self, wallet_id: &str, hash: &[u8; 32], auth: CustodyAuth<'_>) -> Result<String>;
}

#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn fetch_nonce(&self) -> Result<String>;

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<CreateSessionResponse>;
}
