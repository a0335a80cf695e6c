use thiserror::Error;

/// Failure to read a complete snapshot from the source. Never stands in for
/// an empty listing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("missing API key for {0}")]
    MissingCredentials(String),

    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("{endpoint} answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("could not decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("item {index} from {endpoint} could not be decoded: {reason}")]
    Item {
        endpoint: String,
        index: usize,
        id: Option<i64>,
        reason: String,
    },

    #[error("{endpoint} kept reporting more pages after {pages} requests")]
    Pagination { endpoint: String, pages: usize },
}

impl SourceError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MissingCredentials(_)
            | Self::Decode { .. }
            | Self::Item { .. }
            | Self::Pagination { .. } => false,
        }
    }
}
