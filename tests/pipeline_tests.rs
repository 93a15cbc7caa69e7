use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use pose2yolo::{process_dataset, Args, ConversionError, FsStorage, MemoryStorage};

const WIDTH: u32 = 200;
const HEIGHT: u32 = 100;

const VALID_LINE: &str = "0 0.200000 0.300000 0.200000 0.400000 0.250000 0.250000 2 0.000000 0.000000 0 0.500000 0.500000 2";

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("Annotations")).unwrap();
        fs::create_dir_all(root.join("JPEGImages")).unwrap();
        fs::write(
            root.join("Annotations/class_names.txt"),
            "_background_\nnose\nleft_eye\ntail\n",
        )
        .unwrap();
        fs::write(root.join("Annotations/Animal_Class.txt"), "zebra\ncat\n").unwrap();
        Self { _dir: dir, root }
    }

    fn annotations(&self) -> PathBuf {
        self.root.join("Annotations")
    }

    fn images(&self) -> PathBuf {
        self.root.join("JPEGImages")
    }

    fn output(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn args(&self, output: &str) -> Args {
        Args::new(
            self.annotations().to_string_lossy(),
            self.images().to_string_lossy(),
            self.output(output).to_string_lossy(),
        )
    }

    fn add_pickle(&self, category: &str, stem: &str, data: &Value) {
        let dir = self.annotations().join(category);
        fs::create_dir_all(&dir).unwrap();
        let bytes = serde_pickle::to_vec(data, serde_pickle::SerOptions::new()).unwrap();
        fs::write(dir.join(format!("{}.pickle", stem)), bytes).unwrap();
    }

    fn add_json(&self, category: &str, stem: &str, data: &Value) {
        let dir = self.annotations().join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.json", stem)), data.to_string()).unwrap();
    }

    fn add_image(&self, category: &str, stem: &str) {
        let dir = self.images().join(category);
        fs::create_dir_all(&dir).unwrap();
        image::RgbImage::new(WIDTH, HEIGHT)
            .save(dir.join(format!("{}.png", stem)))
            .unwrap();
    }

    fn add_image_dir(&self, category: &str) {
        fs::create_dir_all(self.images().join(category)).unwrap();
    }
}

fn sub_object(bbox: Value) -> Value {
    json!({
        "bbox": bbox,
        "nose": [50, 25],
        "left_eye": [-1, -1],
        "tail": [100, 50],
    })
}

fn valid_annotation() -> Value {
    json!({ "0": sub_object(json!([20, 10, 60, 50])) })
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().is_file())
        .count()
}

/// zebra: 10 annotations with images, cat: 3 annotations with 2 images,
/// okapi: annotations but no image directory.
fn standard_fixture() -> Fixture {
    let fixture = Fixture::new();
    for i in 0..10 {
        let stem = format!("zebra_{:02}", i);
        fixture.add_pickle("zebra", &stem, &valid_annotation());
        fixture.add_image("zebra", &stem);
    }
    for i in 0..3 {
        let stem = format!("cat_{:02}", i);
        fixture.add_pickle("cat", &stem, &valid_annotation());
        if i != 2 {
            fixture.add_image("cat", &stem);
        }
    }
    fixture.add_pickle("okapi", "okapi_00", &valid_annotation());
    fixture
}

#[test]
fn test_end_to_end_split_counts_and_outputs() {
    let fixture = standard_fixture();
    let args = fixture.args("coco_kpts");

    let stats = process_dataset(&args, &FsStorage).unwrap();
    let out = fixture.output("coco_kpts");

    assert_eq!(stats.categories, 2);
    assert_eq!(stats.skipped_categories, vec!["okapi".to_string()]);
    assert_eq!(stats.keypoints, 3);

    // zebra: 9 train + 1 val; cat: 3 train, one without an image.
    assert_eq!(stats.train.total_annotations, 12);
    assert_eq!(stats.train.kept, 11);
    assert_eq!(stats.train.skipped_no_image, 1);
    assert_eq!(stats.val.total_annotations, 1);
    assert_eq!(stats.val.kept, 1);

    let train = read_lines(&out.join("train2017.txt"));
    let val = read_lines(&out.join("val2017.txt"));
    assert_eq!(train.len(), 11);
    assert_eq!(val.len(), 1);
    assert!(val[0].starts_with("./images/val/zebra_"));
    assert!(train.contains(&"./images/train/cat_00.png".to_string()));
    assert!(!train.iter().any(|line| line.contains("cat_02")));
    assert!(!train.iter().any(|line| line.contains("okapi")));

    assert_eq!(count_files(&out.join("labels/train2017")), train.len());
    assert_eq!(count_files(&out.join("labels/val2017")), val.len());
    assert!(!out.join("labels/train2017/cat_02.txt").exists());
    assert_eq!(count_files(&out.join("images")), 12);

    assert_eq!(
        read_lines(&out.join("labels/train2017/cat_00.txt")),
        vec![VALID_LINE.to_string()]
    );
    assert_eq!(
        fs::read(out.join("images/cat_00.png")).unwrap(),
        fs::read(fixture.images().join("cat/cat_00.png")).unwrap()
    );

    let yaml = fs::read_to_string(out.join("dataset.yaml")).unwrap();
    assert!(yaml.contains("kpt_shape: [3, 3]"));
    let summary: Value =
        serde_json::from_str(&fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["train"]["skipped_no_image"], 1);
}

#[test]
fn test_split_is_reproducible_across_runs() {
    let fixture = standard_fixture();

    process_dataset(&fixture.args("first"), &FsStorage).unwrap();
    process_dataset(&fixture.args("second"), &FsStorage).unwrap();

    for manifest in ["train2017.txt", "val2017.txt"] {
        assert_eq!(
            read_lines(&fixture.output("first").join(manifest)),
            read_lines(&fixture.output("second").join(manifest))
        );
    }
}

#[test]
fn test_invalid_bbox_keeps_manifest_entry_with_empty_label() {
    let fixture = Fixture::new();
    let broken = json!({
        "0": sub_object(json!([20, 10, 60, 50])),
        "1": sub_object(json!([1, 2])),
    });
    fixture.add_pickle("cat", "cat_00", &broken);
    fixture.add_image("cat", "cat_00");
    fixture.add_pickle("cat", "cat_01", &valid_annotation());
    fixture.add_image("cat", "cat_01");

    let stats = process_dataset(&fixture.args("coco_kpts"), &FsStorage).unwrap();
    let out = fixture.output("coco_kpts");

    assert_eq!(stats.train.invalid_bbox, 1);
    assert_eq!(stats.train.kept, 1);
    assert_eq!(
        read_lines(&out.join("train2017.txt")),
        vec![
            "./images/train/cat_00.png".to_string(),
            "./images/train/cat_01.png".to_string()
        ]
    );
    assert_eq!(fs::read_to_string(out.join("labels/train2017/cat_00.txt")).unwrap(), "");
    assert!(out.join("images/cat_00.png").is_file());
}

#[test]
fn test_skip_invalid_drops_annotation_from_all_outputs() {
    let fixture = Fixture::new();
    fixture.add_pickle("cat", "cat_00", &json!({ "0": { "nose": [1, 1], "left_eye": [2, 2], "tail": [3, 3] } }));
    fixture.add_image("cat", "cat_00");
    fixture.add_pickle("cat", "cat_01", &valid_annotation());
    fixture.add_image("cat", "cat_01");

    let mut args = fixture.args("coco_kpts");
    args.skip_invalid = true;
    let stats = process_dataset(&args, &FsStorage).unwrap();
    let out = fixture.output("coco_kpts");

    assert_eq!(stats.train.invalid_bbox_dropped, 1);
    assert_eq!(
        read_lines(&out.join("train2017.txt")),
        vec!["./images/train/cat_01.png".to_string()]
    );
    assert!(!out.join("labels/train2017/cat_00.txt").exists());
    assert!(!out.join("images/cat_00.png").exists());
}

#[test]
fn test_missing_keypoint_aborts_the_run() {
    let fixture = Fixture::new();
    fixture.add_pickle("cat", "cat_00", &json!({ "0": { "bbox": [0, 0, 10, 10], "nose": [1, 1] } }));
    fixture.add_image("cat", "cat_00");

    let err = process_dataset(&fixture.args("coco_kpts"), &FsStorage).unwrap_err();
    assert!(matches!(err, ConversionError::Keypoint { ref keypoint, .. } if keypoint == "left_eye"));
}

#[test]
fn test_category_with_empty_image_dir_is_still_split() {
    let fixture = Fixture::new();
    for i in 0..10 {
        fixture.add_pickle("zebra", &format!("zebra_{:02}", i), &valid_annotation());
    }
    fixture.add_image_dir("zebra");

    let stats = process_dataset(&fixture.args("coco_kpts"), &FsStorage).unwrap();

    assert_eq!(stats.train.skipped_no_image, 9);
    assert_eq!(stats.val.skipped_no_image, 1);
    assert_eq!(stats.train.manifest_entries + stats.val.manifest_entries, 0);
    assert!(read_lines(&fixture.output("coco_kpts").join("train2017.txt")).is_empty());
}

#[test]
fn test_split_image_dirs_places_images_under_split() {
    let fixture = standard_fixture();
    let mut args = fixture.args("coco_kpts");
    args.split_image_dirs = true;

    process_dataset(&args, &FsStorage).unwrap();
    let out = fixture.output("coco_kpts");

    for line in read_lines(&out.join("train2017.txt")) {
        assert!(out.join(line.trim_start_matches("./")).is_file(), "{}", line);
    }
    assert_eq!(count_files(&out.join("images/val")), 1);
}

#[test]
fn test_json_annotations_are_accepted() {
    let fixture = Fixture::new();
    fixture.add_json("cat", "cat_00", &valid_annotation());
    fixture.add_image("cat", "cat_00");

    let mut args = fixture.args("coco_kpts");
    args.annotation_suffix_len = ".json".len();
    let stats = process_dataset(&args, &FsStorage).unwrap();

    assert_eq!(stats.train.kept, 1);
    assert_eq!(
        read_lines(&fixture.output("coco_kpts").join("labels/train2017/cat_00.txt")),
        vec![VALID_LINE.to_string()]
    );
}

#[test]
fn test_dry_run_writes_nothing_to_disk() {
    let fixture = standard_fixture();
    let args = fixture.args("coco_kpts");
    let storage = MemoryStorage::new();

    let stats = process_dataset(&args, &storage).unwrap();
    let out = fixture.output("coco_kpts");

    assert!(!out.exists());
    assert_eq!(stats.train.kept, 11);
    let manifest = storage.text(&out.join("train2017.txt")).unwrap();
    assert_eq!(manifest.lines().count(), 11);
    assert_eq!(storage.files_in(&out.join("labels/train2017")).len(), 11);
    assert_eq!(
        storage.text(&out.join("labels/train2017/cat_00.txt")).unwrap(),
        format!("{}\n", VALID_LINE)
    );
}

#[test]
fn test_missing_annotations_dir_is_an_error() {
    let fixture = Fixture::new();
    let mut args = fixture.args("coco_kpts");
    args.class_names = Some(
        fixture
            .annotations()
            .join("class_names.txt")
            .to_string_lossy()
            .into_owned(),
    );
    args.annotations_dir = fixture.root.join("nope").to_string_lossy().into_owned();

    let err = process_dataset(&args, &FsStorage).unwrap_err();
    assert!(matches!(err, ConversionError::MissingDirectory(_)));
}
