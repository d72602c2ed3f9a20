//! Custody gateway HTTP client
//!
//! Talks to the remote custody gateway that holds the wallet's primary key:
//! - `GET  /auth/nonce`
//! - `POST /api/v1/wallets/{walletId}/sign-raw`
//! - `POST /auth/session`

use agentpay_types::{
    CreateSessionRequest, CreateSessionResponse, NonceResponse, SignRawRequest, SignRawResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, header};
use url::Url;

use super::{CustodyAuth, RawHashSigner, SessionIssuer};
use crate::crypto;
use crate::delegation::request_auth::{self, headers};
use crate::error::{Error, Result};
use crate::http::error_body;
use crate::session::SessionRecord;

pub struct GatewayClient {
    base_url: Url,
    http_client: Client,
}

impl GatewayClient {
    pub fn new(base_url: &str, http_client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid gateway URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Gateway URL '{}' cannot be a base", base_url)));
        }
        // Treat the configured URL as a directory so joins keep any path prefix
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http_client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `segments` under the gateway base, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Gateway URL '{}' cannot be a base", self.base_url)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn sign_raw_url(&self, wallet_id: &str) -> Result<Url> {
        self.endpoint(&["api", "v1", "wallets", wallet_id, "sign-raw"])
    }

    /// Send a gateway request authenticated with the delegated session key.
    ///
    /// The signature covers the method, the URL path as the server sees it,
    /// and the exact body bytes sent.
    pub async fn authenticated_request(
        &self,
        session: &SessionRecord,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        let url = self.endpoint(segments)?;
        let body = body.unwrap_or_default();
        let auth = request_auth::sign_request(session, method.as_str(), url.path(), &body)?;

        let mut builder = self.http_client.request(method, url);
        if !body.is_empty() {
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        auth.apply(builder)
            .send()
            .await
            .map_err(Error::remote("authenticated gateway request"))
    }
}

#[async_trait]
impl RawHashSigner for GatewayClient {
    async fn sign_raw_hash(&self, wallet_id: &str, hash: &[u8; 32], auth: CustodyAuth<'_>) -> Result<String> {
        let url = self.sign_raw_url(wallet_id)?;
        let body = serde_json::to_vec(&SignRawRequest {
            data: crypto::to_0x_hex(hash),
        })?;

        let builder = self
            .http_client
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json");

        let builder = match auth {
            CustodyAuth::Bootstrap { address } => {
                log::debug!("[CUSTODY] Bootstrap sign-raw for {} (wallet {})", address, wallet_id);
                builder.header(headers::ADDRESS, address)
            }
            CustodyAuth::Session(session) => {
                log::debug!(
                    "[CUSTODY] Session sign-raw for {} (session {})",
                    session.address,
                    session.session_id
                );
                request_auth::sign_request(session, "POST", url.path(), &body)?.apply(builder)
            }
        };

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(Error::remote("sign-raw"))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            log::warn!("[CUSTODY] sign-raw refused ({}): {}", status, body);
            return Err(Error::DelegationSignFailed { status, body });
        }

        let text = response.text().await.map_err(Error::remote("sign-raw"))?;
        let data: SignRawResponse = serde_json::from_str(&text)
            .map_err(|e| Error::NoSignatureReturned(format!("unparseable sign-raw response: {}", e)))?;

        let signature = data
            .into_signature()
            .ok_or_else(|| Error::NoSignatureReturned("response has neither signature nor result".to_string()))?;

        crypto::normalize_signature(&signature).map_err(|e| Error::NoSignatureReturned(e.to_string()))
    }
}

#[async_trait]
impl SessionIssuer for GatewayClient {
    async fn fetch_nonce(&self) -> Result<String> {
        let url = self.endpoint(&["auth", "nonce"])?;
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(Error::remote("fetch nonce"))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(Error::SessionRejected { status, body });
        }

        let data: NonceResponse = response
            .json()
            .await
            .map_err(|e| Error::ProtocolViolation(format!("Failed to parse nonce response: {}", e)))?;

        if data.nonce.trim().is_empty() {
            return Err(Error::ProtocolViolation("Gateway returned an empty nonce".to_string()));
        }
        Ok(data.nonce)
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<CreateSessionResponse> {
        let url = self.endpoint(&["auth", "session"])?;
        let response = self
            .http_client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(Error::remote("create session"))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            log::warn!("[CUSTODY] Session creation rejected ({}): {}", status, body);
            return Err(Error::SessionRejected { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| Error::ProtocolViolation(format!("Failed to parse session response: {}", e)))
    }
}
