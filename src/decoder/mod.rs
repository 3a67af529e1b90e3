use crate::app::Result;
use crate::domain::{ContentType, Decoded};

/// Turns raw response bytes into the value a request asked for.
#[derive(Clone, Copy, Debug)]
pub struct ResponseDecoder;

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, body: &[u8], content_type: ContentType) -> Result<Decoded> {
        let decoded = match content_type {
            ContentType::Json => {
                let text = String::from_utf8(body.to_vec())?;
                Decoded::Json(serde_json::from_str(&text)?)
            }
            ContentType::Image => Decoded::Image(image::load_from_memory(body)?),
            ContentType::String => Decoded::Text(String::from_utf8(body.to_vec())?),
        };

        Ok(decoded)
    }
}
