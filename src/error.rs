use std::path::PathBuf;
use thiserror::Error;

/// Fatal conversion failures. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to read image dimensions of {}: {source}", .path.display())]
    ImageDimensions {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("image {} has zero width or height", .0.display())]
    EmptyImage(PathBuf),

    #[error("failed to decode pickle annotation {}: {source}", .path.display())]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },

    #[error("failed to decode JSON annotation {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("annotation {} is not a mapping of sub-objects", .0.display())]
    NotAMapping(PathBuf),

    #[error("annotation {}, object {object}: keypoint '{keypoint}' {reason}", .path.display())]
    Keypoint {
        path: PathBuf,
        object: String,
        keypoint: String,
        reason: String,
    },

    #[error("keypoint list {} names no keypoints", .0.display())]
    EmptySchema(PathBuf),

    #[error("failed to serialize run summary: {0}")]
    Summary(#[from] serde_json::Error),
}

impl ConversionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a sub-object's bounding box could not be read. Recovered locally.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BboxError {
    #[error("sub-object is not a mapping")]
    NotAMapping,

    #[error("no 'bbox' entry")]
    Missing,

    #[error("bbox is not a sequence")]
    NotASequence,

    #[error("bbox has {0} values, expected at least 4")]
    TooShort(usize),

    #[error("bbox value {0} is not a number")]
    NotANumber(usize),
}

pub type Result<T> = std::result::Result<T, ConversionError>;
