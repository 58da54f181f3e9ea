use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KycError {
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Face detection error: {0}")]
    FaceDetection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("File size {size} bytes outside allowed range {min}-{max}")]
    FileSize { size: u64, min: u64, max: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
