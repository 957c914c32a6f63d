//! CLI subcommands

pub mod generate;
pub mod inspect;
pub mod lookup;
pub mod predict;
pub mod train;

use crate::config::Config;
use herd_lib::{BundleStore, CsvRecordStore};
use std::path::PathBuf;

const DEFAULT_DATA_PATH: &str = "cattle_data.csv";
const DEFAULT_MODEL_DIR: &str = "models";

/// Record table and bundle directory the commands operate on
#[derive(Debug, Clone, PartialEq)]
pub struct Paths {
    pub data: PathBuf,
    pub model_dir: PathBuf,
}

impl Paths {
    /// Flag or env var first, then the config file, then the defaults
    pub fn resolve(data: Option<PathBuf>, model_dir: Option<PathBuf>, config: &Config) -> Self {
        Self {
            data: data
                .or_else(|| config.data_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            model_dir: model_dir
                .or_else(|| config.model_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR)),
        }
    }

    pub fn records(&self) -> CsvRecordStore {
        CsvRecordStore::new(&self.data)
    }

    pub fn bundles(&self) -> BundleStore {
        BundleStore::new(&self.model_dir)
    }
}
