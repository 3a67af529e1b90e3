use image::DynamicImage;

use crate::domain::ContentType;

/// A response body decoded into the shape its request asked for.
#[derive(Debug, Clone)]
pub enum Decoded {
    Json(serde_json::Value),
    Image(DynamicImage),
    Text(String),
}

impl Decoded {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Json(_) => ContentType::Json,
            Self::Image(_) => ContentType::Image,
            Self::Text(_) => ContentType::String,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// One-line description used by the CLI.
    pub fn summary(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Image(image) => format!(
                "image {}x{} ({:?})",
                image.width(),
                image.height(),
                image.color()
            ),
            Self::Text(text) => text.clone(),
        }
    }
}
