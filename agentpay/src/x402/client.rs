//! x402-aware HTTP client with a per-call spending guard

use std::sync::Arc;

use agentpay_types::{
    AcceptedRequirement, ExactEvmPayload, PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER,
    PaymentPayload, PaymentRequired, PaymentRequirements, SettlementResponse,
};
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};

use super::authorization::PaymentAuthorization;
use super::guard::{GuardAbort, GuardContext};
use super::requirements::{SelectedRequirement, select_requirement};
use crate::config::Config;
use crate::custody::GatewayClient;
use crate::delegation::DelegatedSigner;
use crate::error::{Error, Result, format_usd};
use crate::http::error_body;
use crate::session::{FileSessionStore, SessionManager};
use crate::wallet::WalletRecord;

/// The request to send, replayed verbatim on the paid retry
#[derive(Debug, Clone)]
pub struct RequestInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Default for RequestInit {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestInit {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post_json(body: &serde_json::Value) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            method: Method::POST,
            headers,
            body: Some(serde_json::to_vec(body)?),
        })
    }
}

/// What was paid for a delivered response
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub requirement: PaymentRequirements,
    pub cost_usd: f64,
    pub payer: String,
    /// Decoded X-PAYMENT-RESPONSE, when the server sent one
    pub settlement: Option<SettlementResponse>,
}

/// Result of a guarded request
#[must_use]
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server's response; `payment` is set when a 402 was paid
    Delivered {
        response: Response,
        payment: Option<PaymentReceipt>,
    },
    /// Stopped before any signature was requested
    Aborted(GuardAbort),
}

impl FetchOutcome {
    /// Flatten into a plain result, turning a guard abort into an error.
    pub fn into_response(self) -> Result<Response> {
        match self {
            FetchOutcome::Delivered { response, .. } => Ok(response),
            FetchOutcome::Aborted(abort) => Err(abort.into()),
        }
    }

    pub fn payment(&self) -> Option<&PaymentReceipt> {
        match self {
            FetchOutcome::Delivered { payment, .. } => payment.as_ref(),
            FetchOutcome::Aborted(_) => None,
        }
    }
}

/// HTTP client that pays 402 responses through the delegated session
pub struct PaymentClient {
    http_client: Client,
    sessions: Arc<SessionManager>,
    signer: Arc<DelegatedSigner>,
    wallet: WalletRecord,
}

impl PaymentClient {
    pub fn new(
        http_client: Client,
        sessions: Arc<SessionManager>,
        signer: Arc<DelegatedSigner>,
        wallet: WalletRecord,
    ) -> Self {
        Self {
            http_client,
            sessions,
            signer,
            wallet,
        }
    }

    /// Wire the production stack: gateway client, file session store, and
    /// the wallet written by the setup flow.
    pub fn from_config(config: &Config) -> Result<Self> {
        let wallet = WalletRecord::load(&config.wallet_path())?;
        let http_client = crate::http::build_client(config.request_timeout)?;

        let gateway = Arc::new(GatewayClient::new(&config.gateway_url, http_client.clone())?);
        let signer = Arc::new(DelegatedSigner::new(gateway.clone()));
        let store = Arc::new(FileSessionStore::new(config.session_path()));
        let sessions = Arc::new(SessionManager::new(
            store,
            gateway,
            signer.clone(),
            config.delegation_settings(),
        ));

        log::info!("[X402] Initialized with wallet address: {}", wallet.address);
        Ok(Self::new(http_client, sessions, signer, wallet))
    }

    pub fn wallet(&self) -> &WalletRecord {
        &self.wallet
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    async fn send(&self, url: &str, init: &RequestInit, payment_header: Option<&str>, step: &'static str) -> Result<Response> {
        let mut builder = self
            .http_client
            .request(init.method.clone(), url)
            .headers(init.headers.clone());
        if let Some(body) = &init.body {
            builder = builder.body(body.clone());
        }
        if let Some(value) = payment_header {
            builder = builder.header(PAYMENT_HEADER, value);
        }
        builder.send().await.map_err(Error::remote(step))
    }

    /// Send `init` to `url`; on 402, pay within `guard` and retry once.
    pub async fn request(&self, url: &str, init: &RequestInit, guard: GuardContext) -> Result<FetchOutcome> {
        guard.validate()?;
        url::Url::parse(url).map_err(|e| Error::Config(format!("Invalid URL '{}': {}", url, e)))?;

        log::info!("[X402] Making request to {}", url);
        let initial = self.send(url, init, None, "initial request").await?;

        if initial.status() != StatusCode::PAYMENT_REQUIRED {
            log::info!("[X402] No payment required, status: {}", initial.status());
            return Ok(FetchOutcome::Delivered {
                response: initial,
                payment: None,
            });
        }

        log::info!("[X402] Received 402 Payment Required");
        let payment_required = read_payment_required(initial).await?;
        let selected = select_requirement(&payment_required)?;
        let cost_usd = selected.cost_usd();

        log::info!(
            "[X402] Payment requirements: {} {} to {} on {} ({})",
            selected.requirement.max_amount_required,
            selected.requirement.asset,
            selected.requirement.pay_to,
            selected.requirement.network,
            format_usd(cost_usd)
        );

        if let Err(abort) = guard.check(selected.amount, selected.decimals) {
            log::warn!("[X402] Aborting before signing: {}", abort);
            return Ok(FetchOutcome::Aborted(abort));
        }

        let payment_header = self.sign_payment(&payment_required, &selected).await?;

        log::info!("[X402] Signed payment, retrying request with X-PAYMENT header");
        let paid = self.send(url, init, Some(&payment_header), "paid request").await?;
        let status = paid.status();
        log::info!("[X402] Payment sent, response status: {}", status);

        if !status.is_success() {
            let body = error_body(paid).await;
            log::warn!("[X402] Paid request rejected ({}): {}", status, body);
            return Err(Error::PaymentRejected { status, body });
        }

        let settlement = paid
            .headers()
            .get(PAYMENT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match SettlementResponse::from_base64(v) {
                Ok(settlement) => Some(settlement),
                Err(e) => {
                    log::warn!("[X402] Ignoring unreadable {} header: {}", PAYMENT_RESPONSE_HEADER, e);
                    None
                }
            });

        Ok(FetchOutcome::Delivered {
            response: paid,
            payment: Some(PaymentReceipt {
                requirement: selected.requirement,
                cost_usd,
                payer: self.wallet.address.clone(),
                settlement,
            }),
        })
    }

    /// Build the authorization, have custody sign its EIP-712 hash through
    /// the session, and encode the X-PAYMENT header value.
    async fn sign_payment(&self, payment_required: &PaymentRequired, selected: &SelectedRequirement) -> Result<String> {
        let session = self
            .sessions
            .get_session(&self.wallet.wallet_id, &self.wallet.address)
            .await?;

        let from = self.wallet.parsed_address()?;
        let now_secs = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let authorization = PaymentAuthorization::for_requirement(selected, from, now_secs)?;

        let signature = self
            .signer
            .sign_payment(&authorization.hash(), &session, &self.wallet.wallet_id)
            .await?;

        let payload = PaymentPayload {
            x402_version: payment_required.x402_version,
            scheme: selected.requirement.scheme.clone(),
            network: selected.requirement.network.clone(),
            accepted: (payment_required.x402_version >= 2)
                .then(|| AcceptedRequirement::from(&selected.requirement)),
            payload: ExactEvmPayload {
                signature,
                authorization: authorization.message.to_wire(),
            },
        };

        payload.to_base64().map_err(Error::Encoding)
    }
}

/// Requirements come from the JSON body; v2 servers may send them base64
/// encoded in the PAYMENT-REQUIRED header instead.
async fn read_payment_required(response: Response) -> Result<PaymentRequired> {
    let header = response
        .headers()
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response.bytes().await.map_err(Error::remote("read 402 body"))?;

    match serde_json::from_slice::<PaymentRequired>(&body) {
        Ok(parsed) => Ok(parsed),
        Err(body_err) => match header {
            Some(encoded) => PaymentRequired::from_base64(&encoded).map_err(|header_err| {
                Error::ProtocolViolation(format!(
                    "Malformed 402: body ({}) and {} header ({})",
                    body_err, PAYMENT_REQUIRED_HEADER, header_err
                ))
            }),
            None => Err(Error::ProtocolViolation(format!("Malformed 402 body: {}", body_err))),
        },
    }
}
