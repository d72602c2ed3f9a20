use chrono::{DateTime, SecondsFormat, Utc};

/// Statement prefix binding the primary address to a session public key
pub const DELEGATION_STATEMENT_PREFIX: &str = "Delegate signing authority to session key: ";

/// Fields required to build a SIWE delegation message.
pub struct DelegationMessageFields {
    pub domain: String,
    pub address: String,
    pub session_public_key: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn iso_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the ERC-4361 plaintext delegating signing authority to a session key.
///
/// The verifier parses this structurally, so the field order is fixed:
/// header, address, statement, URI, Version, Chain ID, Nonce, Issued At,
/// Expiration Time.
pub fn build_delegation_message(f: &DelegationMessageFields) -> String {
    format!(
        "{domain} wants you to sign in with your Ethereum account:\n\
         {address}\n\
         \n\
         {statement_prefix}{session_public_key}\n\
         \n\
         URI: {uri}\n\
         Version: 1\n\
         Chain ID: {chain_id}\n\
         Nonce: {nonce}\n\
         Issued At: {issued_at}\n\
         Expiration Time: {expiration_time}",
        domain = f.domain,
        address = f.address,
        statement_prefix = DELEGATION_STATEMENT_PREFIX,
        session_public_key = f.session_public_key,
        uri = f.uri,
        chain_id = f.chain_id,
        nonce = f.nonce,
        issued_at = iso_timestamp(&f.issued_at),
        expiration_time = iso_timestamp(&f.expiration_time),
    )
}
