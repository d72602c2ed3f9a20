use reqwest::StatusCode;

/// Format a USD figure the way every cost report in this crate does.
pub fn format_usd(value: f64) -> String {
    format!("${:.4}", value)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Remote unavailable during {step}: {source}")]
    RemoteUnavailable {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Delegation signing failed ({status}): {body}")]
    DelegationSignFailed { status: StatusCode, body: String },

    #[error("Custody returned no signature: {0}")]
    NoSignatureReturned(String),

    #[error("Session rejected ({status}): {body}")]
    SessionRejected { status: StatusCode, body: String },

    #[error(
        "Spending cap exceeded: request costs {} but the cap is {}",
        format_usd(*cost_usd),
        format_usd(*max_cost_usd)
    )]
    SpendingCapExceeded { cost_usd: f64, max_cost_usd: f64 },

    #[error("Unsupported payment scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Payment rejected ({status}): {body}")]
    PaymentRejected { status: StatusCode, body: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a transport failure with the step it interrupted.
    pub(crate) fn remote(step: &'static str) -> impl FnOnce(reqwest::Error) -> Error {
        move |source| Error::RemoteUnavailable { step, source }
    }
}
