//! Persisted model bundles
//!
//! Each bundle is stored as a bincode envelope carrying a format version,
//! the bundle kind, a SHA-256 checksum and the encoded bundle payload.

use crate::error::StoreError;
use crate::predictor::{BundleKind, BundleMetadata, DiseaseBundle, ModelBundle, YieldBundle};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    kind: BundleKind,
    checksum: String,
    payload: Vec<u8>,
}

/// Directory holding `yield.bundle` and `disease.bundle`
#[derive(Debug, Clone)]
pub struct BundleStore {
    dir: PathBuf,
}

impl BundleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: BundleKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    pub fn exists(&self, kind: BundleKind) -> bool {
        self.path(kind).is_file()
    }

    /// Persist both bundles or neither
    ///
    /// Both are encoded and written to temp files before either final file
    /// is touched.
    pub fn save_pair(
        &self,
        yield_bundle: &YieldBundle,
        disease_bundle: &DiseaseBundle,
    ) -> Result<(), StoreError> {
        let yield_bytes = encode(yield_bundle)?;
        let disease_bytes = encode(disease_bundle)?;

        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let yield_path = self.path(BundleKind::Yield);
        let disease_path = self.path(BundleKind::Disease);
        let yield_temp = write_temp(&yield_path, &yield_bytes)?;
        let disease_temp = match write_temp(&disease_path, &disease_bytes) {
            Ok(path) => path,
            Err(e) => {
                remove_temp(&yield_temp);
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&yield_temp, &yield_path) {
            remove_temp(&yield_temp);
            remove_temp(&disease_temp);
            return Err(StoreError::io(&yield_path, e));
        }
        if let Err(e) = fs::rename(&disease_temp, &disease_path) {
            remove_temp(&disease_temp);
            error!(
                dir = %self.dir.display(),
                error = %e,
                "Yield bundle replaced but disease bundle was not; retrain before serving"
            );
            return Err(StoreError::io(&disease_path, e));
        }

        info!(
            dir = %self.dir.display(),
            yield_bytes = yield_bytes.len(),
            disease_bytes = disease_bytes.len(),
            "Saved model bundles"
        );
        Ok(())
    }

    pub fn load_yield(&self) -> Result<YieldBundle, StoreError> {
        self.load(BundleKind::Yield)
    }

    pub fn load_disease(&self) -> Result<DiseaseBundle, StoreError> {
        self.load(BundleKind::Disease)
    }

    /// Metadata of a stored bundle, verified like a full load
    pub fn metadata(&self, kind: BundleKind) -> Result<BundleMetadata, StoreError> {
        match kind {
            BundleKind::Yield => self.load_yield().map(|b| b.metadata().clone()),
            BundleKind::Disease => self.load_disease().map(|b| b.metadata().clone()),
        }
    }

    fn load<M: DeserializeOwned>(&self, kind: BundleKind) -> Result<ModelBundle<M>, StoreError> {
        let path = self.path(kind);
        let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        let envelope: Envelope = bincode::deserialize(&bytes)?;

        if envelope.format_version != BUNDLE_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(envelope.format_version));
        }
        if envelope.kind != kind {
            return Err(kind_mismatch(&path, kind, envelope.kind));
        }
        let actual = compute_checksum(&envelope.payload);
        if actual != envelope.checksum {
            return Err(StoreError::ChecksumMismatch {
                path: path.display().to_string(),
                expected: envelope.checksum,
                actual,
            });
        }

        let bundle: ModelBundle<M> = bincode::deserialize(&envelope.payload)?;
        if bundle.metadata().kind != kind {
            return Err(kind_mismatch(&path, kind, bundle.metadata().kind));
        }
        info!(
            kind = %kind,
            path = %path.display(),
            checksum = %actual,
            "Model bundle checksum validated"
        );
        Ok(bundle)
    }
}

/// SHA-256 of `data` as lowercase hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn encode<M: Serialize>(bundle: &ModelBundle<M>) -> Result<Vec<u8>, StoreError> {
    let payload = bincode::serialize(bundle)?;
    let envelope = Envelope {
        format_version: BUNDLE_FORMAT_VERSION,
        kind: bundle.metadata().kind,
        checksum: compute_checksum(&payload),
        payload,
    };
    Ok(bincode::serialize(&envelope)?)
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    let temp_path = path.with_extension("bundle.tmp");
    let mut file = File::create(&temp_path).map_err(|e| StoreError::io(&temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StoreError::io(&temp_path, e))?;
    Ok(temp_path)
}

fn remove_temp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to remove temp bundle file");
    }
}

fn kind_mismatch(path: &Path, expected: BundleKind, actual: BundleKind) -> StoreError {
    StoreError::KindMismatch {
        path: path.display().to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestConfig, RandomForestClassifier, RandomForestRegressor};
    use crate::generator::{GeneratorConfig, SyntheticGenerator};
    use crate::pipeline::PipelineSpec;
    use chrono::Utc;
    use tempfile::TempDir;

    fn bundles() -> (YieldBundle, DiseaseBundle) {
        let records = SyntheticGenerator::new(GeneratorConfig { samples: 60, seed: 5 }).generate();
        let pipeline = PipelineSpec::cattle().fit(&records).unwrap();
        let matrix = pipeline.transform_table(&records).unwrap();
        let yields: Vec<f64> = records.iter().map(|r| r.milk_yield).collect();
        let labels: Vec<_> = records.iter().map(|r| r.disease_label).collect();

        let metadata = |kind: BundleKind| BundleMetadata {
            kind,
            created_at: Utc::now(),
            training_rows: records.len(),
            test_rows: 0,
            feature_width: pipeline.width(),
            n_trees: 8,
            metric_name: kind.metric_name().to_string(),
            metric_value: 1.0,
        };
        let regressor =
            RandomForestRegressor::fit(ForestConfig::regression().with_trees(8), &matrix, &yields)
                .unwrap();
        let classifier = RandomForestClassifier::fit(
            ForestConfig::classification().with_trees(8),
            &matrix,
            &labels,
        )
        .unwrap();
        (
            ModelBundle::new(pipeline.clone(), regressor, metadata(BundleKind::Yield)).unwrap(),
            ModelBundle::new(pipeline.clone(), classifier, metadata(BundleKind::Disease)).unwrap(),
        )
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"hello world");
        assert_eq!(
            checksum,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_failed_disease_rename_removes_its_temp_file() {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        // a non-empty directory where the disease bundle should land
        fs::create_dir_all(models.join("disease.bundle")).unwrap();
        fs::write(models.join("disease.bundle/keep"), b"x").unwrap();

        let store = BundleStore::new(&models);
        let (yield_bundle, disease_bundle) = bundles();
        assert!(matches!(
            store.save_pair(&yield_bundle, &disease_bundle),
            Err(StoreError::Io { .. })
        ));
        assert!(!models.join("disease.bundle.tmp").exists());
        assert!(!models.join("yield.bundle.tmp").exists());
        assert!(store.load_disease().is_err());
    }

    #[test]
    fn test_save_and_load_pair() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path().join("models"));
        let (yield_bundle, disease_bundle) = bundles();

        store.save_pair(&yield_bundle, &disease_bundle).unwrap();
        assert!(store.exists(BundleKind::Yield));
        assert!(store.exists(BundleKind::Disease));
        assert!(!dir.path().join("models/yield.bundle.tmp").exists());

        assert_eq!(store.load_yield().unwrap(), yield_bundle);
        assert_eq!(store.load_disease().unwrap(), disease_bundle);
        assert_eq!(
            store.metadata(BundleKind::Disease).unwrap().metric_name,
            "accuracy"
        );
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let (yield_bundle, disease_bundle) = bundles();
        store.save_pair(&yield_bundle, &disease_bundle).unwrap();

        let path = store.path(BundleKind::Yield);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            store.load_yield(),
            Err(StoreError::ChecksumMismatch { .. })
        ));
        assert!(store.load_disease().is_ok());
    }

    #[test]
    fn test_swapped_files_fail_kind_check() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        let (yield_bundle, disease_bundle) = bundles();
        store.save_pair(&yield_bundle, &disease_bundle).unwrap();

        fs::copy(store.path(BundleKind::Disease), store.path(BundleKind::Yield)).unwrap();
        assert!(matches!(
            store.load_yield(),
            Err(StoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_bundle_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = BundleStore::new(dir.path());
        assert!(matches!(store.load_disease(), Err(StoreError::Io { .. })));
    }
}
