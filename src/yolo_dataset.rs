use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::annotation::load_annotation;
use crate::config::Args;
use crate::conversion::{convert_to_yolo_format, LabelContent};
use crate::dataset::{scan_dataset, split_dataset, ImageIndex};
use crate::error::{ConversionError, Result};
use crate::io::{
    create_dataset_yaml, read_keypoint_schema, setup_output_directories, DatasetStorage, OutputLayout,
};
use crate::types::{AnnotationOutcome, KeypointSchema, ProcessingStats, Record, Split, SplitStats};
use crate::utils::{create_progress_bar, read_image_dimensions};

/// An annotation after the read-only part of its conversion.
#[derive(Debug, Clone)]
pub enum PreparedAnnotation<'a> {
    /// No image matched the annotation name.
    NoImage { annotation: &'a Record },
    Ready {
        annotation: &'a Record,
        image: &'a Record,
        label_stem: String,
        label: LabelContent,
    },
}

/// Match an annotation to its image, read the image size and convert the annotation.
pub fn prepare_annotation<'a>(
    annotation: &'a Record,
    images: &'a ImageIndex,
    schema: &KeypointSchema,
    annotation_suffix_len: usize,
) -> Result<PreparedAnnotation<'a>> {
    let stem = annotation.stem(annotation_suffix_len);
    let Some(image) = images.find(stem) else {
        return Ok(PreparedAnnotation::NoImage { annotation });
    };

    let dims = read_image_dimensions(&image.path)?;
    let pose = load_annotation(&annotation.path)?;
    let label = convert_to_yolo_format(&pose, schema, dims)?;

    Ok(PreparedAnnotation::Ready {
        annotation,
        image,
        label_stem: stem.to_string(),
        label,
    })
}

/// Write the label file and image copy of a prepared annotation.
///
/// Returns the outcome and, when the image was written, its manifest entry.
pub fn materialize_annotation(
    prepared: &PreparedAnnotation<'_>,
    split: Split,
    layout: &OutputLayout,
    skip_invalid: bool,
    storage: &dyn DatasetStorage,
) -> Result<(AnnotationOutcome, Option<String>)> {
    let (annotation, image, label_stem, label) = match prepared {
        PreparedAnnotation::NoImage { annotation } => {
            debug!("No image found for annotation {}", annotation.path.display());
            return Ok((AnnotationOutcome::SkippedNoImage, None));
        }
        PreparedAnnotation::Ready {
            annotation,
            image,
            label_stem,
            label,
        } => (annotation, image, label_stem, label),
    };

    if let Some(e) = &label.bbox_error {
        if skip_invalid {
            warn!(
                "Dropping {} ({}): unreadable bbox",
                annotation.path.display(),
                e
            );
            return Ok((AnnotationOutcome::InvalidBbox { written: false }, None));
        }
        warn!(
            "Unreadable bbox in {} ({}); writing an empty label file",
            annotation.path.display(),
            e
        );
    }

    let label_path = layout
        .labels_dir(split)
        .join(format!("{}.txt", sanitize_filename::sanitize(label_stem)));
    storage
        .write_file(&label_path, &label.to_file_contents())
        .map_err(|e| ConversionError::io(&label_path, e))?;

    let image_name = sanitize_filename::sanitize(&image.name);
    let image_output_path = layout.images_dir(split).join(&image_name);
    storage
        .copy_file(&image.path, &image_output_path)
        .map_err(|e| ConversionError::io(&image.path, e))?;

    let outcome = if label.is_valid() {
        AnnotationOutcome::Kept
    } else {
        AnnotationOutcome::InvalidBbox { written: true }
    };
    Ok((outcome, Some(OutputLayout::manifest_entry(split, &image_name))))
}

/// Convert one split and write its manifest
pub fn process_split(
    split: Split,
    annotations: &[Record],
    images: &ImageIndex,
    schema: &KeypointSchema,
    layout: &OutputLayout,
    args: &Args,
    storage: &dyn DatasetStorage,
) -> Result<SplitStats> {
    let pb = create_progress_bar(annotations.len() as u64, split.label());

    // Reading is parallel; writing below stays in input order.
    let prepared = annotations
        .par_iter()
        .map(|annotation| {
            let result = prepare_annotation(annotation, images, schema, args.annotation_suffix_len);
            pb.inc(1);
            result
        })
        .collect::<Result<Vec<_>>>();
    pb.finish_with_message(format!("{} processing complete", split.label()));
    let prepared = prepared?;

    let mut stats = SplitStats::default();
    let mut manifest = String::new();
    for item in &prepared {
        let (outcome, entry) = materialize_annotation(item, split, layout, args.skip_invalid, storage)?;
        stats.record(outcome);
        if let Some(entry) = entry {
            manifest.push_str(&entry);
            manifest.push('\n');
        }
    }

    let manifest_path = layout.manifest_path(split);
    storage
        .write_file(&manifest_path, &manifest)
        .map_err(|e| ConversionError::io(&manifest_path, e))?;

    info!(
        "[{}] wrote {} manifest entries to {}",
        split.label(),
        stats.manifest_entries,
        manifest_path.display()
    );
    Ok(stats)
}

/// Main dataset processing pipeline
pub fn process_dataset(args: &Args, storage: &dyn DatasetStorage) -> Result<ProcessingStats> {
    let annotations_dir = PathBuf::from(&args.annotations_dir);
    let images_dir = PathBuf::from(&args.images_dir);

    let schema = read_keypoint_schema(&args.class_names_path())?;
    info!("Loaded {} keypoint names.", schema.len());

    let scanned = scan_dataset(&annotations_dir, &images_dir, &args.ignore)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let split_data = split_dataset(&scanned.categories, args.val_size, &mut rng);
    info!(
        "Split {} annotations into {} train and {} val.",
        split_data.train_annotations.len() + split_data.val_annotations.len(),
        split_data.train_annotations.len(),
        split_data.val_annotations.len()
    );

    let images = ImageIndex::new(scanned.images(), args.image_suffix_len);

    let layout = OutputLayout::new(&args.output_dir, args.split_image_dirs);
    setup_output_directories(&layout, storage)?;

    let mut stats = ProcessingStats::new();
    stats.categories = scanned.categories.len();
    stats.skipped_categories = scanned.skipped_categories.clone();
    stats.keypoints = schema.len();

    for split in Split::ALL {
        *stats.split_mut(split) = process_split(
            split,
            split_data.get(split),
            &images,
            &schema,
            &layout,
            args,
            storage,
        )?;
    }

    info!("Creating dataset.yaml file...");
    create_dataset_yaml(&layout, &schema, &args.class_name, storage)?;
    write_summary(&layout.summary_path(), &stats, storage)?;

    Ok(stats)
}

fn write_summary(path: &Path, stats: &ProcessingStats, storage: &dyn DatasetStorage) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    storage
        .write_file(path, &json)
        .map_err(|e| ConversionError::io(path, e))
}
