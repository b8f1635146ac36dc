use thiserror::Error;

/// Error taxonomy for the relay.
///
/// `Connect` and `NotFound` form the "suppressible" class: for list-shaped
/// operations the service contract treats them as "no data yet" rather than
/// failures, so the gateway client swallows them there and only there.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not reach notification service: {0}")]
    Connect(String),

    #[error("not found")]
    NotFound,

    #[error("notification service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response from notification service: {0}")]
    Decode(String),

    #[error("outbox i/o error: {0}")]
    Outbox(#[from] std::io::Error),

    #[error("outbox encoding error: {0}")]
    OutboxEncoding(#[from] serde_json::Error),
}

impl AppError {
    /// Transient transport failures and 404s are "no data", not errors, on
    /// the paths that opt into suppression.
    pub fn is_suppressible(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::NotFound)
    }

    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            // connect refused, DNS, timeout, TLS: all one transient class
            Self::Connect(e.to_string())
        }
    }
}
