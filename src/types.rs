use serde::Serialize;
use std::path::PathBuf;

/// Sentinel entry of the class-name list that is not a keypoint.
pub const BACKGROUND_CLASS: &str = "_background_";

/// Class id written for every object; the dataset has a single class.
pub const CLASS_ID: usize = 0;

/// A file found by the scanner. `name` is the bare file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub path: PathBuf,
    pub name: String,
}

impl Record {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// The name with its last `suffix_len` characters removed.
    pub fn stem(&self, suffix_len: usize) -> &str {
        strip_suffix_chars(&self.name, suffix_len)
    }
}

/// Remove the last `count` characters of `name`, yielding "" when it is shorter.
pub fn strip_suffix_chars(name: &str, count: usize) -> &str {
    let total = name.chars().count();
    if count >= total {
        return "";
    }
    match name.char_indices().nth(total - count) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// One category directory found by the scanner.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub annotations: Vec<Record>,
    pub images: Vec<Record>,
}

/// Ordered keypoint names defining the column order of every label line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypointSchema {
    names: Vec<String>,
}

impl KeypointSchema {
    /// Parse a newline-separated class-name list, dropping the background
    /// sentinel and blank lines.
    pub fn from_class_names(contents: &str) -> Self {
        let names = contents
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != BACKGROUND_CLASS)
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Pixel dimensions of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// The two dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }

    /// Directory and manifest name, e.g. `train2017`.
    pub fn dir_name(&self) -> String {
        format!("{}2017", self.as_str())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Split::Train => "Train",
            Split::Val => "Val",
        }
    }
}

// Annotation records assigned to each split, in processing order
#[derive(Debug, Default, Clone)]
pub struct SplitData {
    pub train_annotations: Vec<Record>,
    pub val_annotations: Vec<Record>,
}

impl SplitData {
    pub fn get(&self, split: Split) -> &[Record] {
        match split {
            Split::Train => &self.train_annotations,
            Split::Val => &self.val_annotations,
        }
    }
}

/// What happened to a single annotation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// Label file, image copy and manifest entry were written.
    Kept,
    /// No image with a matching name; nothing was written.
    SkippedNoImage,
    /// The bbox of some sub-object could not be read. The label file is
    /// empty while the image and manifest entry are still written, unless
    /// invalid annotations are skipped.
    InvalidBbox { written: bool },
}

// Counters for one split
#[derive(Debug, Default, Clone, Serialize)]
pub struct SplitStats {
    pub total_annotations: usize,
    pub kept: usize,
    pub skipped_no_image: usize,
    pub invalid_bbox: usize,
    pub invalid_bbox_dropped: usize,
    pub manifest_entries: usize,
}

impl SplitStats {
    pub fn record(&mut self, outcome: AnnotationOutcome) {
        self.total_annotations += 1;
        match outcome {
            AnnotationOutcome::Kept => {
                self.kept += 1;
                self.manifest_entries += 1;
            }
            AnnotationOutcome::SkippedNoImage => self.skipped_no_image += 1,
            AnnotationOutcome::InvalidBbox { written: true } => {
                self.invalid_bbox += 1;
                self.manifest_entries += 1;
            }
            AnnotationOutcome::InvalidBbox { written: false } => {
                self.invalid_bbox += 1;
                self.invalid_bbox_dropped += 1;
            }
        }
    }
}

// Struct to hold processing statistics for a whole run
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessingStats {
    pub categories: usize,
    pub skipped_categories: Vec<String>,
    pub keypoints: usize,
    pub train: SplitStats,
    pub val: SplitStats,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn split(&self, split: Split) -> &SplitStats {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
        }
    }

    pub fn split_mut(&mut self, split: Split) -> &mut SplitStats {
        match split {
            Split::Train => &mut self.train,
            Split::Val => &mut self.val,
        }
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!(
            "Categories converted: {} ({} keypoints per object)",
            self.categories,
            self.keypoints
        );
        if !self.skipped_categories.is_empty() {
            log::warn!(
                "Skipped categories without an image directory: {}",
                self.skipped_categories.join(", ")
            );
        }
        for split in Split::ALL {
            let stats = self.split(split);
            log::info!(
                "[{}] annotations: {}, kept: {}, skipped (no image): {}, invalid bbox: {}",
                split.label(),
                stats.total_annotations,
                stats.kept,
                stats.skipped_no_image,
                stats.invalid_bbox
            );
            if stats.invalid_bbox > stats.invalid_bbox_dropped {
                log::warn!(
                    "[{}] {} manifest entries point at empty label files (unreadable bbox)",
                    split.label(),
                    stats.invalid_bbox - stats.invalid_bbox_dropped
                );
            }
        }
    }
}
