//! Durable storage collaborators
//!
//! - [`CsvRecordStore`]: the labeled record table, one CSV file
//! - [`BundleStore`]: the two persisted model bundles

mod bundles;
mod records;

pub use bundles::{compute_checksum, BundleStore, BUNDLE_FORMAT_VERSION};
pub use records::{CsvRecordStore, COLUMNS};
