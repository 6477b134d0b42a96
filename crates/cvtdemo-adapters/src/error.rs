use cvtdemo_contract::ContractError;

/// Errors raised by the adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The producer could not be reached or the exchange failed mid-way.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// A response body did not decode as expected.
    #[error("response body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The mock has no operation to answer with.
    #[error("no operation in {schema_id} matches {method} {path}")]
    NoMockOperation {
        schema_id: String,
        method: String,
        path: String,
    },
}

pub type Result<T> = std::result::Result<T, AdapterError>;
