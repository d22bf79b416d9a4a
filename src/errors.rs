use thiserror::Error;

#[derive(Debug, Error)]
pub enum VltError {
    #[error("IMEI must be a 15-digit number: {0:?}")]
    InvalidIdentifier(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("failed to extract data from format: {0}")]
    ExtractionFailure(String),
    /// Connection error, timeout or a non-2xx status.
    #[error("send failed: {reason}")]
    SendFailure { reason: String },
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("couldn't render timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

impl From<reqwest::Error> for VltError {
    fn from(e: reqwest::Error) -> Self {
        let reason = if e.is_timeout() {
            format!("request timed out: {e}")
        } else if e.is_connect() {
            format!("connection failed: {e}")
        } else {
            e.to_string()
        };
        VltError::SendFailure { reason }
    }
}
