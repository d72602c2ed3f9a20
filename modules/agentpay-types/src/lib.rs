//! Wire types shared between agentpay clients and the servers they talk to:
//! the x402 payment-required document, the signed payment payload, and the
//! custody gateway's session/sign-raw bodies.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

/// Header carrying the base64 payment payload on the paid retry
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header carrying the base64 settlement result on the paid response
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Header some x402 v2 servers use instead of a JSON 402 body
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";

// =====================================================
// x402 Types
// =====================================================

/// Body of a 402 Payment Required response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One accepted way to pay for a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Amount in the asset's smallest unit, as a decimal string (`amount` in v2)
    #[serde(alias = "amount")]
    pub max_amount_required: String,
    pub asset: String,
    #[serde(alias = "payToAddress")]
    pub pay_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Scheme-specific metadata, e.g. the token's EIP-712 `name` and `version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Payment payload sent to the server in the X-PAYMENT header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    /// Echo of the selected requirement (x402 v2 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<AcceptedRequirement>,
    pub payload: ExactEvmPayload,
}

/// A requirement as x402 v2 spells it, echoed back in `accepted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRequirement {
    pub scheme: String,
    pub network: String,
    #[serde(alias = "maxAmountRequired")]
    pub amount: String,
    pub asset: String,
    pub pay_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl From<&PaymentRequirements> for AcceptedRequirement {
    fn from(req: &PaymentRequirements) -> Self {
        Self {
            scheme: req.scheme.clone(),
            network: req.network.clone(),
            amount: req.max_amount_required.clone(),
            asset: req.asset.clone(),
            pay_to: req.pay_to.clone(),
            max_timeout_seconds: req.max_timeout_seconds,
            extra: req.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: Eip3009Authorization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

/// Settlement result returned in the X-PAYMENT-RESPONSE header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

impl PaymentPayload {
    /// Encode payment payload to base64 for the X-PAYMENT header
    pub fn to_base64(&self) -> Result<String, String> {
        let json = serde_json::to_string(self)
            .map_err(|e| format!("Failed to serialize payment payload: {}", e))?;
        Ok(STANDARD.encode(json))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        decode_base64_json(encoded, "payment payload")
    }
}

impl PaymentRequired {
    /// Decode payment requirements from a base64 PAYMENT-REQUIRED header
    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        decode_base64_json(encoded, "payment required header")
    }
}

impl SettlementResponse {
    pub fn from_base64(encoded: &str) -> Result<Self, String> {
        decode_base64_json(encoded, "payment response header")
    }

    pub fn to_base64(&self) -> Result<String, String> {
        let json = serde_json::to_string(self)
            .map_err(|e| format!("Failed to serialize payment response: {}", e))?;
        Ok(STANDARD.encode(json))
    }
}

fn decode_base64_json<T: serde::de::DeserializeOwned>(encoded: &str, what: &str) -> Result<T, String> {
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("Failed to decode {}: {}", what, e))?;
    let json = String::from_utf8(decoded)
        .map_err(|e| format!("Invalid UTF-8 in {}: {}", what, e))?;
    serde_json::from_str(&json).map_err(|e| format!("Failed to parse {}: {}", what, e))
}

// =====================================================
// Custody Gateway Types
// =====================================================

/// `GET /auth/nonce`
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// `POST /api/v1/wallets/{walletId}/sign-raw`
#[derive(Debug, Serialize, Deserialize)]
pub struct SignRawRequest {
    /// 0x-prefixed 32-byte hash
    pub data: String,
}

/// Providers answer with either `signature` or `result`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SignRawResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl SignRawResponse {
    pub fn into_signature(self) -> Option<String> {
        self.signature
            .or(self.result)
            .filter(|s| !s.trim().is_empty())
    }
}

/// `POST /auth/session`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub siwe_message: String,
    pub signature: String,
    pub session_public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub address: String,
    /// Unix milliseconds
    pub expires_at: i64,
}
