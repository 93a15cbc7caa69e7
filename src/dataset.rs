use log::{debug, info, warn};
use rand::seq::index::sample;
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConversionError, Result};
use crate::types::{Category, Record, SplitData};
use crate::utils::list_directory;

/// Categories found on disk, in sorted name order.
#[derive(Debug, Clone, Default)]
pub struct ScannedDataset {
    pub categories: Vec<Category>,
    /// Categories with annotations but no image directory.
    pub skipped_categories: Vec<String>,
}

impl ScannedDataset {
    /// Every image of every retained category, in scan order.
    pub fn images(&self) -> impl Iterator<Item = &Record> {
        self.categories.iter().flat_map(|c| c.images.iter())
    }
}

/// Walk the per-category annotation and image directories.
///
/// Each non-ignored sub-directory of `annotations_dir` is a category. A
/// category whose counterpart under `images_dir` is missing is left out.
pub fn scan_dataset(annotations_dir: &Path, images_dir: &Path, ignore: &[String]) -> Result<ScannedDataset> {
    if !annotations_dir.is_dir() {
        return Err(ConversionError::MissingDirectory(annotations_dir.to_path_buf()));
    }

    let mut scanned = ScannedDataset::default();
    for (path, name, is_dir) in list_directory(annotations_dir)? {
        if ignore.iter().any(|ignored| ignored == &name) {
            continue;
        }
        if !is_dir {
            debug!("Ignoring non-directory entry {}", path.display());
            continue;
        }

        let annotations = list_records(&path)?;

        let category_images = images_dir.join(&name);
        if !category_images.is_dir() {
            warn!(
                "No image directory for category '{}' ({}); skipping {} annotations",
                name,
                category_images.display(),
                annotations.len()
            );
            scanned.skipped_categories.push(name);
            continue;
        }
        let images = list_records(&category_images)?;

        debug!(
            "Category '{}': {} annotations, {} images",
            name,
            annotations.len(),
            images.len()
        );
        scanned.categories.push(Category {
            name,
            annotations,
            images,
        });
    }

    info!(
        "Found {} categories ({} skipped)",
        scanned.categories.len(),
        scanned.skipped_categories.len()
    );
    Ok(scanned)
}

fn list_records(dir: &Path) -> Result<Vec<Record>> {
    Ok(list_directory(dir)?
        .into_iter()
        .filter(|(_, _, is_dir)| !is_dir)
        .map(|(path, name, _)| Record::new(path, name))
        .collect())
}

/// Validation and training indices of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySplit {
    /// In sampling order.
    pub val_indices: Vec<usize>,
    /// Ascending.
    pub train_indices: Vec<usize>,
}

/// Number of validation samples for a category of `total` annotations.
pub fn validation_count(total: usize, val_size: f64) -> usize {
    (total as f64 * val_size).floor() as usize
}

/// Sample `floor(val_size * total)` distinct validation indices; the rest train.
pub fn split_category<R: Rng + ?Sized>(total: usize, val_size: f64, rng: &mut R) -> CategorySplit {
    let count = validation_count(total, val_size).min(total);
    let val_indices = sample(rng, total, count).into_vec();

    let mut is_val = vec![false; total];
    for &i in &val_indices {
        is_val[i] = true;
    }
    let train_indices = (0..total).filter(|&i| !is_val[i]).collect();

    CategorySplit {
        val_indices,
        train_indices,
    }
}

/// Split every category with the same generator, concatenating in category order.
pub fn split_dataset<R: Rng + ?Sized>(categories: &[Category], val_size: f64, rng: &mut R) -> SplitData {
    let mut split_data = SplitData::default();
    for category in categories {
        let split = split_category(category.annotations.len(), val_size, rng);
        split_data
            .val_annotations
            .extend(split.val_indices.iter().map(|&i| category.annotations[i].clone()));
        split_data
            .train_annotations
            .extend(split.train_indices.iter().map(|&i| category.annotations[i].clone()));
    }
    split_data
}

/// Lookup from stripped image name to image record.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    images: Vec<Record>,
    by_stem: HashMap<String, usize>,
}

impl ImageIndex {
    /// For duplicate stems the first image wins.
    pub fn new<'a>(images: impl IntoIterator<Item = &'a Record>, suffix_len: usize) -> Self {
        let images: Vec<Record> = images.into_iter().cloned().collect();
        let mut by_stem = HashMap::with_capacity(images.len());
        for (i, image) in images.iter().enumerate() {
            by_stem.entry(image.stem(suffix_len).to_string()).or_insert(i);
        }
        Self { images, by_stem }
    }

    pub fn find(&self, stem: &str) -> Option<&Record> {
        self.by_stem.get(stem).map(|&i| &self.images[i])
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
