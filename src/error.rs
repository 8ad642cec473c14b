use std::io;

use thiserror::Error;

/// Errors surfaced by model loading and tagging.
#[derive(Debug, Error)]
pub enum Error {
    /// The model could not be read, or its content is not a valid CRF model.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// The decoder could not produce a label sequence for an instance.
    #[error("decode error: {0}")]
    Decode(String),
    /// The feature extractor failed on an observation.
    #[error("feature extraction failed: {0}")]
    Extractor(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A label that is not part of the model was requested.
    #[error("unknown label: {0}")]
    UnknownLabel(String),
    /// The deadline passed before the instance reached the decoder.
    #[error("deadline exceeded before decoding")]
    DeadlineExceeded,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_model<S: Into<String>>(msg: S) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub(crate) fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
