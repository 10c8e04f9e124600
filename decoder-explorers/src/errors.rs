use decoder_core::Address;

#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("chain {0} not supported")]
    ChainNotSupported(u64),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("contract {0:?} source code not verified")]
    ContractCodeNotVerified(Address),
    #[error("response error: status {status}, message {message}, result {result:?}")]
    ErrorResponse { status: String, message: String, result: Option<String> },
    #[error("bad status code {0}")]
    BadStatusCode(String),
    #[error("missing client field: {0}")]
    Builder(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl ExplorerError {
    /// Transient errors make the pool move on to the next provider;
    /// configuration errors exclude a provider from the pool at startup.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::ChainNotSupported(_) | Self::Builder(_) | Self::Url(_))
    }
}
