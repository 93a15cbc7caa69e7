use clap::Parser;

use log::{error, info};
use std::path::PathBuf;

use pose2yolo::{process_dataset, Args, DatasetStorage, FsStorage, MemoryStorage};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let annotations_dir = PathBuf::from(&args.annotations_dir);
    if !annotations_dir.exists() {
        error!(
            "The specified annotations_dir does not exist: {}",
            args.annotations_dir
        );
        std::process::exit(1);
    }

    info!("Starting the conversion process...");

    let fs_storage = FsStorage;
    let memory_storage = MemoryStorage::new();
    let storage: &dyn DatasetStorage = if args.dry_run {
        info!("Dry run: nothing will be written to {}", args.output_dir);
        &memory_storage
    } else {
        &fs_storage
    };

    match process_dataset(&args, storage) {
        Ok(stats) => {
            stats.print_summary();
            if args.dry_run {
                info!(
                    "Dry run complete; {} files would have been written.",
                    memory_storage.file_count()
                );
            } else {
                info!("Conversion process completed successfully.");
            }
        }
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            std::process::exit(1);
        }
    }
}
