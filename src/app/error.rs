use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Text decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Cache error: {0}")]
    CacheIo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch queue is closed")]
    QueueClosed,

    #[error("Request was dropped before completing")]
    Abandoned,
}

impl FetchError {
    /// True for failures that happened while turning bytes into a value.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Json(_) | Self::Image(_) | Self::Utf8(_))
    }

    /// True for failures of the network round-trip itself.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }

    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        if self.is_transfer() {
            return "transfer";
        }
        if self.is_decode() {
            return "decode";
        }
        match self {
            Self::InvalidRequest(_) | Self::InvalidUrl(_) => "invalid_request",
            Self::CacheIo(_) | Self::Io(_) => "cache_io",
            Self::Config(_) => "config",
            Self::QueueClosed => "queue_closed",
            Self::Abandoned => "abandoned",
            _ => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
