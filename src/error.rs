use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// Rate limiting, server errors and transport failures are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_builder() && !e.is_redirect(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidUrl { .. } => false,
        }
    }
}
