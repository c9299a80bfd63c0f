use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::MAX_IMAGE_BYTES;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Image is empty")]
    Empty,
    #[error("Image is {size} bytes, the limit is {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Bounded photo attached to a symptom description.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImageAttachment {
    pub fn new(bytes: Vec<u8>, mime_type: &str) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                limit: MAX_IMAGE_BYTES,
            });
        }
        Ok(Self {
            bytes,
            mime_type: mime_type.to_string(),
        })
    }

    /// JPEG is what cameras hand over in practice.
    pub fn jpeg(bytes: Vec<u8>) -> Result<Self, ImageError> {
        Self::new(bytes, "image/jpeg")
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Inline reference stored on the consultation record.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
