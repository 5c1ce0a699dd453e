//! Error types for the faceset-train crate.
//!
//! Dataset construction treats a malformed identity folder as a corrupt
//! dataset and fails outright; per-sample failures surface from `try_get`.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for dataset indexing, sample loading and augmentation.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The dataset root does not exist or is not a directory.
    #[error("Dataset root not found: {path}")]
    RootNotFound {
        /// The configured image root.
        path: PathBuf,
    },

    /// Error when walking a directory fails.
    #[error("Failed to read directory: {path}")]
    DirectoryReadFailed {
        /// The directory being scanned.
        path: PathBuf,
        /// The underlying walk error.
        #[source]
        source: walkdir::Error,
    },

    /// Error when path components contain invalid UTF-8.
    #[error("Path contains invalid UTF-8: {path}")]
    InvalidUtf8Path {
        /// The path with invalid UTF-8.
        path: PathBuf,
    },

    /// An identity folder name has no `_<id>` suffix.
    #[error("Identity folder '{folder}' has no '_<id>' suffix")]
    MissingIdSuffix {
        /// The offending folder name.
        folder: String,
    },

    /// The suffix after the last underscore is not an integer.
    #[error("Identity folder '{folder}' has non-numeric id '{token}'")]
    NonNumericId {
        /// The offending folder name.
        folder: String,
        /// The suffix that failed to parse.
        token: String,
    },

    /// The numeric id is outside the accepted range, including ids too large
    /// to parse.
    #[error("Identity folder '{folder}' has id {token} outside [0, {max}]")]
    IdOutOfRange {
        /// The offending folder name.
        folder: String,
        /// The id suffix as written.
        token: String,
        /// The inclusive upper bound.
        max: i64,
    },

    /// A sample belongs to an identity that never received a label.
    #[error("Sample {path} belongs to unregistered identity '{identity}'")]
    UnregisteredIdentity {
        /// The sample path.
        path: PathBuf,
        /// The identity key derived from its parent folder.
        identity: String,
    },

    /// A sample index past the end of the dataset.
    #[error("Sample index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The dataset length.
        len: usize,
    },

    /// Error when opening or decoding an image file fails.
    #[error("Failed to open image: {path}")]
    ImageOpenFailed {
        /// The image file path that failed to open.
        path: PathBuf,
        /// The underlying image processing error.
        #[source]
        source: image::ImageError,
    },

    /// A transform received a frame in the wrong representation.
    #[error("Transform {transform} expects a {expected} frame")]
    UnexpectedFrame {
        /// Name of the transform.
        transform: &'static str,
        /// The representation it accepts.
        expected: &'static str,
    },

    /// A transform was configured with unusable parameters.
    #[error("Invalid parameter for {transform}: {reason}")]
    InvalidTransformParameter {
        /// Name of the transform.
        transform: &'static str,
        /// Why the parameter is rejected.
        reason: String,
    },
}

/// A specialized `Result` type for dataset operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
