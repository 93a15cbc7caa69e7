use dashmap::{DashMap, DashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ConversionError, Result};
use crate::types::{KeypointSchema, Split};

/// File-system side effects of a conversion run.
pub trait DatasetStorage: Sync {
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()>;

    /// Create or truncate `path` with `contents`.
    fn write_file(&self, path: &Path, contents: &str) -> std::io::Result<()>;

    /// Copy `src` byte for byte to `dst`, overwriting it.
    fn copy_file(&self, src: &Path, dst: &Path) -> std::io::Result<()>;
}

/// Storage backed by the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl DatasetStorage for FsStorage {
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(contents.as_bytes())?;
        writer.flush()
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        fs::copy(src, dst).map(|_| ())
    }
}

/// A file recorded by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFile {
    Text(String),
    CopyOf(PathBuf),
}

/// Storage that records writes instead of performing them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    dirs: DashSet<PathBuf>,
    files: DashMap<PathBuf, StoredFile>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, path: &Path) -> Option<StoredFile> {
        self.files.get(path).map(|entry| entry.value().clone())
    }

    pub fn text(&self, path: &Path) -> Option<String> {
        match self.file(path)? {
            StoredFile::Text(text) => Some(text),
            StoredFile::CopyOf(_) => None,
        }
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }

    /// Every recorded file under `dir`, sorted.
    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|entry| entry.key().parent() == Some(dir))
            .map(|entry| entry.key().clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl DatasetStorage for MemoryStorage {
    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        self.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        self.files
            .insert(path.to_path_buf(), StoredFile::Text(contents.to_string()));
        Ok(())
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> std::io::Result<()> {
        if !src.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source file {} does not exist", src.display()),
            ));
        }
        self.files
            .insert(dst.to_path_buf(), StoredFile::CopyOf(src.to_path_buf()));
        Ok(())
    }
}

/// Paths of the generated dataset.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub split_image_dirs: bool,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, split_image_dirs: bool) -> Self {
        Self {
            root: root.into(),
            split_image_dirs,
        }
    }

    pub fn images_root(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn images_dir(&self, split: Split) -> PathBuf {
        if self.split_image_dirs {
            self.images_root().join(split.as_str())
        } else {
            self.images_root()
        }
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join("labels").join(split.dir_name())
    }

    pub fn manifest_path(&self, split: Split) -> PathBuf {
        self.root.join(format!("{}.txt", split.dir_name()))
    }

    /// Manifest line for an image, relative to the dataset root.
    pub fn manifest_entry(split: Split, image_name: &str) -> String {
        format!("./images/{}/{}", split.as_str(), image_name)
    }

    pub fn dataset_yaml_path(&self) -> PathBuf {
        self.root.join("dataset.yaml")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }
}

/// Set up the directory structure for the keypoint dataset
pub fn setup_output_directories(layout: &OutputLayout, storage: &dyn DatasetStorage) -> Result<()> {
    let mut dirs = vec![layout.images_root()];
    for split in Split::ALL {
        dirs.push(layout.labels_dir(split));
        dirs.push(layout.images_dir(split));
    }
    for dir in dirs {
        storage
            .create_dir_all(&dir)
            .map_err(|e| ConversionError::io(&dir, e))?;
    }
    Ok(())
}

/// Read the ordered keypoint names from a class-name list
pub fn read_keypoint_schema(path: &Path) -> Result<KeypointSchema> {
    let contents = fs::read_to_string(path).map_err(|e| ConversionError::io(path, e))?;
    let schema = KeypointSchema::from_class_names(&contents);
    if schema.is_empty() {
        return Err(ConversionError::EmptySchema(path.to_path_buf()));
    }
    Ok(schema)
}

/// Render dataset.yaml for a YOLO pose trainer
pub fn render_dataset_yaml(root: &Path, keypoints: usize, class_name: &str) -> String {
    let mut yaml_content = format!(
        "path: {}\ntrain: {}.txt\nval: {}.txt\n",
        root.to_string_lossy(),
        Split::Train.dir_name(),
        Split::Val.dir_name()
    );
    yaml_content.push_str(&format!("\nkpt_shape: [{}, 3]\n", keypoints));
    yaml_content.push_str("\nnames:\n");
    yaml_content.push_str(&format!("    0: {}\n", class_name));
    yaml_content
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(
    layout: &OutputLayout,
    schema: &KeypointSchema,
    class_name: &str,
    storage: &dyn DatasetStorage,
) -> Result<()> {
    let absolute_path = fs::canonicalize(&layout.root).unwrap_or_else(|_| layout.root.clone());
    let yaml_content = render_dataset_yaml(&absolute_path, schema.len(), class_name);
    let path = layout.dataset_yaml_path();
    storage
        .write_file(&path, &yaml_content)
        .map_err(|e| ConversionError::io(&path, e))
}
