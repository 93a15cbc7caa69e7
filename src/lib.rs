//! Animal pose annotations to YOLO keypoint format converter
//!
//! This library converts per-category pickled keypoint/bbox annotations into a
//! YOLO keypoint dataset: normalized label files, a copied image corpus and
//! `train2017.txt`/`val2017.txt` manifests.

pub mod annotation;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod types;
pub mod utils;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::Args;
pub use error::{BboxError, ConversionError, Result};
pub use io::{setup_output_directories, DatasetStorage, FsStorage, MemoryStorage, OutputLayout};
pub use types::{AnnotationOutcome, KeypointSchema, ProcessingStats, Record, Split, SplitData};
pub use yolo_dataset::process_dataset;
