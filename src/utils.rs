use image::metadata::Orientation;
use image::{ImageDecoder, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;
use std::path::{Path, PathBuf};

use crate::error::{ConversionError, Result};
use crate::types::ImageDimensions;

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Read the displayed width and height of an image from its header.
///
/// Pixels are not decoded. An EXIF orientation that rotates by a quarter
/// turn swaps the stored width and height.
pub fn read_image_dimensions(path: &Path) -> Result<ImageDimensions> {
    let dimensions_error = |source| ConversionError::ImageDimensions {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| ConversionError::io(path, e))?
        .into_decoder()
        .map_err(dimensions_error)?;

    let (stored_width, stored_height) = decoder.dimensions();
    let orientation = decoder.orientation().map_err(dimensions_error)?;
    let (width, height) = match orientation {
        Orientation::Rotate90 | Orientation::Rotate270 | Orientation::Rotate90FlipH | Orientation::Rotate270FlipH => {
            (stored_height, stored_width)
        }
        _ => (stored_width, stored_height),
    };

    if width == 0 || height == 0 {
        return Err(ConversionError::EmptyImage(path.to_path_buf()));
    }
    Ok(ImageDimensions { width, height })
}

/// Direct children of `dir`, sorted by file name, as `(path, name, is_dir)`
pub fn list_directory(dir: &Path) -> Result<Vec<(PathBuf, String, bool)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .skip_hidden(false)
        .sort(true)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
            ConversionError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let is_dir = path.is_dir();
        entries.push((path, name, is_dir));
    }
    Ok(entries)
}
