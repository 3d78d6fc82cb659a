use thiserror::Error;

/// Every way a dashboard operation can fail.
///
/// The first three variants are the core taxonomy: network problems while
/// talking to an origin, input rejected before any request is made, and
/// required configuration that was never supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// A request was rejected, timed out, or came back with a non-2xx status.
    #[error("{0}")]
    NetworkFailure(String),

    /// Empty or malformed long URL. No request was sent.
    #[error("{0}")]
    InvalidInput(String),

    /// A required environment variable is absent or blank.
    #[error("{0} must be set in the environment or .env file")]
    ConfigurationMissing(&'static str),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// A submission is already in flight.
    #[error("a link is already being shortened")]
    SubmissionPending,

    #[error("there is no short URL to copy yet")]
    NothingToCopy,

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
}

impl DashboardError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkFailure(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::NetworkFailure(format!("unexpected response body: {err}"))
        } else {
            Self::NetworkFailure(err.to_string())
        }
    }
}
