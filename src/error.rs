use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Stats, odds or a result needed for a fixture were not supplied.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported market/selection: {market} / {selection}")]
    UnsupportedMarket { market: String, selection: String },
}

impl EngineError {
    pub fn missing(field: &str) -> Self {
        Self::DataUnavailable(format!("missing {field}"))
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    pub fn unsupported(market: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::UnsupportedMarket {
            market: market.into(),
            selection: selection.into(),
        }
    }
}
