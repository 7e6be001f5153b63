//! Error types for chart comparisons.
//!
//! "No data yet" is not an error: an empty store or a key with a single
//! snapshot date produces a report whose state is
//! [`ReportState::InsufficientHistory`](crate::classify::ReportState).
//! Only malformed inputs and backend failures end up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid dimension key: {0}")]
    InvalidDimensionKey(String),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for ChartError {
    fn from(err: anyhow::Error) -> Self {
        ChartError::Store(err)
    }
}

impl ChartError {
    /// True when the caller supplied bad input (maps to a 400 at the HTTP edge).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ChartError::Store(_))
    }
}

pub type Result<T, E = ChartError> = std::result::Result<T, E>;
