//! Base64 file-upload envelopes sent by the client for `<input type="file">`.

use base64::{Engine, engine::general_purpose::STANDARD};
use drafter_core::form::FILE_UPLOAD_TAG;
use image::DynamicImage;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file upload is missing the \"{0}\" field")]
    MissingField(&'static str),
    #[error("file upload content is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("file upload content is not valid UTF-8")]
    NotUtf8,
    #[error("cannot open uploaded image: {0}")]
    Image(#[from] image::ImageError),
}

/// Whether `value` is a `{__file_upload__: true, ...}` envelope.
pub fn is_upload(value: &Value) -> bool {
    value
        .get(FILE_UPLOAD_TAG)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Mapping view of an uploaded file with its content decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn from_envelope(envelope: &Value) -> Result<Self, UploadError> {
        let field = |name: &'static str| {
            envelope
                .get(name)
                .and_then(Value::as_str)
                .ok_or(UploadError::MissingField(name))
        };

        let content = STANDARD.decode(field("content")?)?;
        let size = envelope
            .get("size")
            .and_then(Value::as_u64)
            .map_or(content.len(), |size| size as usize);

        Ok(Self {
            filename: field("filename")?.to_string(),
            mime_type: envelope
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_string(),
            size,
            content,
        })
    }

    pub fn into_text(self) -> Result<String, UploadError> {
        String::from_utf8(self.content).map_err(|_| UploadError::NotUtf8)
    }

    /// The envelope with raw bytes in place of the base64 content.
    pub fn to_json(&self) -> Value {
        json!({
            FILE_UPLOAD_TAG: true,
            "filename": self.filename,
            "type": self.mime_type,
            "size": self.size,
            "content": self.content,
        })
    }
}

/// An uploaded PNG or JPEG, decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub file: UploadedFile,
    pub image: DynamicImage,
}

impl UploadedImage {
    pub fn open(file: UploadedFile) -> Result<Self, UploadError> {
        let image = image::load_from_memory(&file.content)?;
        Ok(Self { file, image })
    }

    /// Raw bytes as uploaded.
    pub fn bytes(&self) -> &[u8] {
        &self.file.content
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
