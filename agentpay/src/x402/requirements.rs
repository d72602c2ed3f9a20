//! Selecting and resolving a payment requirement from a 402 document

use agentpay_types::{PaymentRequired, PaymentRequirements};
use ethers::types::Address;

use crate::error::{Error, Result};

/// The only scheme this client pays with
pub const EXACT_SCHEME: &str = "exact";

/// USDC contract address on Base mainnet
pub const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

/// USDC contract address on Base Sepolia
pub const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

pub const BASE_CHAIN_ID: u64 = 8453;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;

/// Decimals of the stablecoins in scope
pub const STABLECOIN_DECIMALS: u32 = 6;

/// EIP-712 domain defaults for USDC
const DEFAULT_TOKEN_NAME: &str = "USD Coin";
const DEFAULT_TOKEN_VERSION: &str = "2";

/// A requirement this client can pay, with every field resolved
#[derive(Debug, Clone)]
pub struct SelectedRequirement {
    pub requirement: PaymentRequirements,
    pub chain_id: u64,
    pub asset: Address,
    pub pay_to: Address,
    /// Smallest asset unit
    pub amount: u128,
    pub decimals: u32,
    pub token_name: String,
    pub token_version: String,
}

impl SelectedRequirement {
    pub fn cost_usd(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Map an x402 network identifier (legacy name or CAIP-2) to an EVM chain id.
pub fn chain_id_for_network(network: &str) -> Option<u64> {
    match network.to_ascii_lowercase().as_str() {
        "base" => Some(BASE_CHAIN_ID),
        "base-sepolia" => Some(BASE_SEPOLIA_CHAIN_ID),
        other => other.strip_prefix("eip155:").and_then(|id| id.parse().ok()),
    }
}

/// Canonical USDC contract for a chain, if we know one
fn usdc_contract(chain_id: u64) -> Option<Address> {
    let contract = match chain_id {
        BASE_CHAIN_ID => USDC_BASE,
        BASE_SEPOLIA_CHAIN_ID => USDC_BASE_SEPOLIA,
        _ => return None,
    };
    contract.parse().ok()
}

/// Resolve the asset to a 6-decimal USD stablecoin contract.
///
/// Only the `USDC` symbol or the chain's known USDC contract qualifies; the
/// guard prices every selected amount at `STABLECOIN_DECIMALS`.
fn resolve_asset(asset: &str, chain_id: u64) -> Option<Address> {
    let usdc = usdc_contract(chain_id)?;
    if asset.trim().eq_ignore_ascii_case("usdc") {
        return Some(usdc);
    }
    let requested: Address = asset.trim().parse().ok()?;
    (requested == usdc).then_some(usdc)
}

/// Parse an address, left-padding short hex forms to 20 bytes the way the
/// ABI encodes addresses.
pub fn parse_address(value: &str) -> Result<Address> {
    let raw = value.trim().strip_prefix("0x").unwrap_or(value.trim());
    if raw.is_empty() || raw.len() > 40 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::ProtocolViolation(format!("Invalid address: '{}'", value)));
    }
    let padded = format!("{:0>40}", raw);
    let bytes = hex::decode(&padded).map_err(|e| Error::ProtocolViolation(format!("Invalid address '{}': {}", value, e)))?;
    Ok(Address::from_slice(&bytes))
}

fn extra_str(requirement: &PaymentRequirements, key: &str) -> Option<String> {
    requirement
        .extra
        .as_ref()
        .and_then(|e| e.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Pick the first `exact` requirement paid in USDC on a known EVM network.
///
/// Once a candidate is chosen its fields must be well formed: a bad amount or
/// payee is a protocol violation, not a reason to try the next entry.
pub fn select_requirement(doc: &PaymentRequired) -> Result<SelectedRequirement> {
    let candidate = doc.accepts.iter().find_map(|req| {
        if !req.scheme.eq_ignore_ascii_case(EXACT_SCHEME) {
            return None;
        }
        let chain_id = chain_id_for_network(&req.network)?;
        let asset = resolve_asset(&req.asset, chain_id)?;
        Some((req, chain_id, asset))
    });

    let Some((req, chain_id, asset)) = candidate else {
        let offered = doc
            .accepts
            .iter()
            .map(|r| format!("{}/{}/{}", r.scheme, r.network, r.asset))
            .collect::<Vec<_>>();
        return Err(Error::UnsupportedScheme(if offered.is_empty() {
            "402 response offers no payment options".to_string()
        } else {
            format!("no exact USDC option among [{}]", offered.join(", "))
        }));
    };

    let amount: u128 = req.max_amount_required.trim().parse().map_err(|_| {
        Error::ProtocolViolation(format!("Invalid payment amount: '{}'", req.max_amount_required))
    })?;

    Ok(SelectedRequirement {
        requirement: req.clone(),
        chain_id,
        asset,
        pay_to: parse_address(&req.pay_to)?,
        amount,
        decimals: STABLECOIN_DECIMALS,
        token_name: extra_str(req, "name").unwrap_or_else(|| DEFAULT_TOKEN_NAME.to_string()),
        token_version: extra_str(req, "version").unwrap_or_else(|| DEFAULT_TOKEN_VERSION.to_string()),
    })
}
