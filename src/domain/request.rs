use std::fmt;

use crate::app::{FetchError, Result};

/// Shape the caller wants the response body delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ContentType {
    Json,
    Image,
    String,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Image => "image",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// HTTP method of a transfer; a POST carries its form-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post(String),
}

/// A single fetch, carrying an opaque `reference` that is handed back
/// untouched in the terminal notification.
#[derive(Debug, Clone)]
pub struct Request<R> {
    pub url: String,
    pub content_type: ContentType,
    pub post_data: Option<String>,
    pub use_cache: bool,
    pub reference: R,
}

impl<R> Request<R> {
    pub fn new(url: impl Into<String>, content_type: ContentType, reference: R) -> Self {
        Self {
            url: url.into(),
            content_type,
            post_data: None,
            use_cache: false,
            reference,
        }
    }

    pub fn post(mut self, data: impl Into<String>) -> Self {
        self.post_data = Some(data.into());
        self
    }

    pub fn cached(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn method(&self) -> Method {
        match &self.post_data {
            Some(body) => Method::Post(body.clone()),
            None => Method::Get,
        }
    }

    /// Checks the URL without consuming the request.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(FetchError::InvalidRequest("empty URL".into()));
        }
        url::Url::parse(&self.url)?;
        Ok(())
    }
}
