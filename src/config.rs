use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;

/// Root-level entries of the annotation directory that are not categories.
pub const DEFAULT_IGNORED_ENTRIES: &[&str] = &["class_names.txt", "Animal_Class.txt", "skeleton.pkl"];

/// Command-line arguments for converting pose annotations to a YOLO keypoint dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Directory with one sub-directory of annotation files per category
    #[arg(short = 'a', long = "annotations_dir", default_value = "Annotations")]
    pub annotations_dir: String,

    /// Directory with one sub-directory of images per category
    #[arg(short = 'i', long = "images_dir")]
    pub images_dir: String,

    /// Root of the generated dataset
    #[arg(short = 'o', long = "output_dir", default_value = "coco_kpts")]
    pub output_dir: String,

    /// Keypoint name list (defaults to <annotations_dir>/class_names.txt)
    #[arg(long = "class_names")]
    pub class_names: Option<String>,

    /// Proportion of each category to use for validation
    #[arg(long = "val_size", default_value_t = 0.1, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for the validation sampler
    #[arg(long = "seed", default_value_t = 1)]
    pub seed: u64,

    /// Characters stripped from annotation file names before matching
    #[arg(long = "annotation_suffix_len", default_value_t = 7)]
    pub annotation_suffix_len: usize,

    /// Characters stripped from image file names before matching
    #[arg(long = "image_suffix_len", default_value_t = 4)]
    pub image_suffix_len: usize,

    /// Entries of the annotation directory that are not categories
    #[arg(long = "ignore", value_delimiter = ',', default_values = ["class_names.txt", "Animal_Class.txt", "skeleton.pkl"])]
    pub ignore: Vec<String>,

    /// Name written for class 0 in dataset.yaml
    #[arg(long = "class_name", default_value = "animal")]
    pub class_name: String,

    /// Copy images into images/<split>/ instead of a flat images/ directory
    #[arg(long = "split_image_dirs")]
    pub split_image_dirs: bool,

    /// Leave annotations with an unreadable bbox out of every output
    #[arg(long = "skip_invalid")]
    pub skip_invalid: bool,

    /// Run the conversion without writing anything to disk
    #[arg(long = "dry_run")]
    pub dry_run: bool,
}

impl Args {
    /// Arguments with every default applied, for library callers.
    pub fn new(annotations_dir: impl Into<String>, images_dir: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            annotations_dir: annotations_dir.into(),
            images_dir: images_dir.into(),
            output_dir: output_dir.into(),
            class_names: None,
            val_size: 0.1,
            seed: 1,
            annotation_suffix_len: 7,
            image_suffix_len: 4,
            ignore: DEFAULT_IGNORED_ENTRIES.iter().map(|s| s.to_string()).collect(),
            class_name: "animal".to_string(),
            split_image_dirs: false,
            skip_invalid: false,
            dry_run: false,
        }
    }

    pub fn class_names_path(&self) -> PathBuf {
        match &self.class_names {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.annotations_dir).join("class_names.txt"),
        }
    }
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}
