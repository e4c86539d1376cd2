use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Sanity check failed: {0}")]
    SanityCheck(String),

    #[error("Decoder error: {0}")]
    Decoder(String),
}

impl From<ndarray::ShapeError> for ForensicsError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForensicsError::Shape(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForensicsError>;
