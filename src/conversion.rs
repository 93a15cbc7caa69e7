use log::debug;
use crate::annotation::{PoseAnnotation, SubAnnotation};
use crate::error::{BboxError, ConversionError, Result};
use crate::types::{ImageDimensions, KeypointSchema, CLASS_ID};

/// Visibility flag of a keypoint that is not labeled.
pub const VISIBILITY_HIDDEN: u8 = 0;
/// Visibility flag of a labeled keypoint. Occlusion is not distinguished.
pub const VISIBILITY_VISIBLE: u8 = 2;

/// Convert a corner-form bbox `[x0, y0, x1, y1]` into normalized
/// `[x_center, y_center, width, height]`. Values are not clamped.
pub fn convert_bbox(bbox: [f64; 4], height: f64, width: f64) -> [f64; 4] {
    let [x0, y0, x1, y1] = bbox;
    [
        (x0 + (x1 - x0) / 2.0) / width,
        (y0 + (y1 - y0) / 2.0) / height,
        (x1 - x0) / width,
        (y1 - y0) / height,
    ]
}

/// Inverse of [`convert_bbox`].
pub fn bbox_to_corners(center: [f64; 4], height: f64, width: f64) -> [f64; 4] {
    let [cx, cy, bw, bh] = center;
    let (w, h) = (bw * width, bh * height);
    let (x0, y0) = (cx * width - w / 2.0, cy * height - h / 2.0);
    [x0, y0, x0 + w, y0 + h]
}

/// A normalized keypoint with its visibility flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub visibility: u8,
}

/// Normalize a pixel keypoint. `-1` in either coordinate marks it hidden.
pub fn normalize_keypoint((x, y): (f64, f64), height: f64, width: f64) -> Keypoint {
    if x == -1.0 || y == -1.0 {
        Keypoint {
            x: 0.0,
            y: 0.0,
            visibility: VISIBILITY_HIDDEN,
        }
    } else {
        Keypoint {
            x: x / width,
            y: y / height,
            visibility: VISIBILITY_VISIBLE,
        }
    }
}

/// The rendered label of one sub-object.
#[derive(Debug, Clone)]
pub struct ObjectLine {
    pub bbox: std::result::Result<[f64; 4], BboxError>,
    pub keypoints: Vec<Keypoint>,
}

impl ObjectLine {
    /// `class cx cy w h` followed by `x y v` per keypoint. A missing bbox
    /// leaves its segment out.
    pub fn render(&self) -> String {
        let mut line = String::with_capacity(48 + self.keypoints.len() * 20);
        if let Ok([cx, cy, w, h]) = self.bbox {
            line.push_str(&format!("{} {:.6} {:.6} {:.6} {:.6}", CLASS_ID, cx, cy, w, h));
        }
        for kp in &self.keypoints {
            line.push_str(&format!(" {:.6} {:.6} {}", kp.x, kp.y, kp.visibility));
        }
        line
    }
}

/// Converted contents of one label file.
#[derive(Debug, Clone, Default)]
pub struct LabelContent {
    pub lines: Vec<ObjectLine>,
    /// First bbox failure, if any. One failure invalidates the whole file.
    pub bbox_error: Option<BboxError>,
}

impl LabelContent {
    pub fn is_valid(&self) -> bool {
        self.bbox_error.is_none()
    }

    /// The text written to disk. Empty when any sub-object had a bad bbox.
    pub fn to_file_contents(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        self.lines.iter().fold(String::new(), |mut acc, line| {
            acc.push_str(&line.render());
            acc.push('\n');
            acc
        })
    }
}

/// Convert one sub-object against the keypoint schema.
pub fn convert_sub_annotation(
    annotation: &PoseAnnotation,
    object: &SubAnnotation,
    schema: &KeypointSchema,
    dims: ImageDimensions,
) -> Result<ObjectLine> {
    let (height, width) = (dims.height as f64, dims.width as f64);
    let bbox = object.bbox().map(|bbox| convert_bbox(bbox, height, width));

    let keypoints = schema
        .names()
        .iter()
        .map(|name| {
            object
                .keypoint(name)
                .map(|point| normalize_keypoint(point, height, width))
                .map_err(|reason| ConversionError::Keypoint {
                    path: annotation.path.clone(),
                    object: object.key.clone(),
                    keypoint: name.clone(),
                    reason,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ObjectLine { bbox, keypoints })
}

/// Convert every sub-object of an annotation into label lines
pub fn convert_to_yolo_format(
    annotation: &PoseAnnotation,
    schema: &KeypointSchema,
    dims: ImageDimensions,
) -> Result<LabelContent> {
    let mut content = LabelContent {
        lines: Vec::with_capacity(annotation.objects.len()),
        bbox_error: None,
    };

    for object in &annotation.objects {
        let line = convert_sub_annotation(annotation, object, schema, dims)?;
        if let Err(e) = &line.bbox {
            debug!(
                "Unreadable bbox in {} (object {}): {}",
                annotation.path.display(),
                object.key,
                e
            );
            if content.bbox_error.is_none() {
                content.bbox_error = Some(e.clone());
            }
        }
        content.lines.push(line);
    }

    Ok(content)
}
