//! EIP-3009 TransferWithAuthorization typed data for the `exact` scheme

use agentpay_types::Eip3009Authorization;
use ethers::abi::{Token, encode};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

use super::requirements::SelectedRequirement;
use crate::error::{Error, Result};

/// Validity window used when the server does not state one
pub const DEFAULT_VALIDITY_SECS: u64 = 3600;

/// Shortest validity window we will sign
pub const MIN_VALIDITY_SECS: u64 = 60;

const DOMAIN_TYPE: &[u8] = b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

const TRANSFER_WITH_AUTHORIZATION_TYPE: &[u8] =
    b"TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)";

/// EIP-712 domain of the token contract
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> H256 {
        let encoded = encode(&[
            Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
            Token::FixedBytes(keccak256(self.name.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(self.version.as_bytes()).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ]);
        H256::from(keccak256(&encoded))
    }
}

/// TransferWithAuthorization message for EIP-3009
#[derive(Debug, Clone)]
pub struct TransferWithAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: H256,
}

impl TransferWithAuthorization {
    pub fn struct_hash(&self) -> H256 {
        let encoded = encode(&[
            Token::FixedBytes(keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE).to_vec()),
            Token::Address(self.from),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Uint(self.valid_after),
            Token::Uint(self.valid_before),
            Token::FixedBytes(self.nonce.as_bytes().to_vec()),
        ]);
        H256::from(keccak256(&encoded))
    }

    /// Wire form carried in the payment payload
    pub fn to_wire(&self) -> Eip3009Authorization {
        Eip3009Authorization {
            from: format!("{:?}", self.from),
            to: format!("{:?}", self.to),
            value: self.value.to_string(),
            valid_after: self.valid_after.to_string(),
            valid_before: self.valid_before.to_string(),
            nonce: format!("{:?}", self.nonce),
        }
    }
}

/// `keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`
pub fn typed_data_hash(domain: &Eip712Domain, message: &TransferWithAuthorization) -> [u8; 32] {
    let mut to_sign = Vec::with_capacity(66);
    to_sign.push(0x19);
    to_sign.push(0x01);
    to_sign.extend_from_slice(domain.separator().as_bytes());
    to_sign.extend_from_slice(message.struct_hash().as_bytes());
    keccak256(&to_sign)
}

/// A payment authorization ready to be signed by custody
pub struct PaymentAuthorization {
    pub domain: Eip712Domain,
    pub message: TransferWithAuthorization,
}

impl PaymentAuthorization {
    /// Authorize `from` to pay the selected requirement, valid from now until
    /// the server's timeout (at least one minute).
    pub fn for_requirement(selected: &SelectedRequirement, from: Address, now_secs: u64) -> Result<Self> {
        let window = selected
            .requirement
            .max_timeout_seconds
            .unwrap_or(DEFAULT_VALIDITY_SECS)
            .max(MIN_VALIDITY_SECS);

        Ok(Self {
            domain: Eip712Domain {
                name: selected.token_name.clone(),
                version: selected.token_version.clone(),
                chain_id: selected.chain_id,
                verifying_contract: selected.asset,
            },
            message: TransferWithAuthorization {
                from,
                to: selected.pay_to,
                value: U256::from(selected.amount),
                valid_after: U256::zero(),
                valid_before: U256::from(now_secs.saturating_add(window)),
                nonce: random_nonce()?,
            },
        })
    }

    pub fn hash(&self) -> [u8; 32] {
        typed_data_hash(&self.domain, &self.message)
    }
}

/// Cryptographically secure 32-byte authorization nonce
fn random_nonce() -> Result<H256> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::Encoding(format!("Failed to generate random bytes: {}", e)))?;
    Ok(H256::from(bytes))
}
