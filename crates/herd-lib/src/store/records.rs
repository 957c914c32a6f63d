//! CSV-backed record table

use crate::error::{SchemaError, StoreError};
use crate::models::{
    Breed, CattleRecord, DiseaseLabel, FeedType, HousingQuality, LabeledRecord, LactationStage,
    Season, VaccinationStatus,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Table columns in file order
pub const COLUMNS: [&str; 22] = [
    "Animal_ID",
    "Breed",
    "Age",
    "Weight",
    "Lactation_Stage",
    "Parity",
    "Feed_Type",
    "Feed_Quantity",
    "Protein_Content",
    "Walking_Distance",
    "Grazing_Duration",
    "Rumination_Time",
    "Rest_Hours",
    "Body_Temperature",
    "Heart_Rate",
    "Vaccination_Status",
    "Temperature",
    "Humidity",
    "Season",
    "Housing_Quality",
    "Milk_Yield",
    "Disease_Label",
];

/// Flat row layout; the csv crate cannot deserialize flattened structs
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Animal_ID")]
    animal_id: String,
    #[serde(rename = "Breed")]
    breed: Breed,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Weight")]
    weight: f64,
    #[serde(rename = "Lactation_Stage")]
    lactation_stage: LactationStage,
    #[serde(rename = "Parity")]
    parity: u32,
    #[serde(rename = "Feed_Type")]
    feed_type: FeedType,
    #[serde(rename = "Feed_Quantity")]
    feed_quantity: f64,
    #[serde(rename = "Protein_Content")]
    protein_content: f64,
    #[serde(rename = "Walking_Distance")]
    walking_distance: f64,
    #[serde(rename = "Grazing_Duration")]
    grazing_duration: f64,
    #[serde(rename = "Rumination_Time")]
    rumination_time: f64,
    #[serde(rename = "Rest_Hours")]
    rest_hours: f64,
    #[serde(rename = "Body_Temperature")]
    body_temperature: f64,
    #[serde(rename = "Heart_Rate")]
    heart_rate: f64,
    #[serde(rename = "Vaccination_Status")]
    vaccination_status: VaccinationStatus,
    #[serde(rename = "Temperature")]
    temperature: f64,
    #[serde(rename = "Humidity", deserialize_with = "whole_percentage")]
    humidity: u32,
    #[serde(rename = "Season")]
    season: Season,
    #[serde(rename = "Housing_Quality")]
    housing_quality: HousingQuality,
    #[serde(rename = "Milk_Yield")]
    milk_yield: f64,
    #[serde(rename = "Disease_Label")]
    disease_label: DiseaseLabel,
}

/// Humidity is written as a whole percentage, but hand-edited tables may
/// carry a fraction. Those are rounded to the nearest percent on read.
fn whole_percentage<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?.round();
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "humidity {value} is not a percentage"
        )));
    }
    Ok(value as u32)
}

impl From<&LabeledRecord> for CsvRow {
    fn from(labeled: &LabeledRecord) -> Self {
        let r = &labeled.record;
        Self {
            animal_id: r.animal_id.clone().unwrap_or_default(),
            breed: r.breed.clone(),
            age: r.age_months,
            weight: r.weight_kg,
            lactation_stage: r.lactation_stage.clone(),
            parity: r.parity,
            feed_type: r.feed_type.clone(),
            feed_quantity: r.feed_quantity,
            protein_content: r.protein_content,
            walking_distance: r.walking_distance,
            grazing_duration: r.grazing_duration,
            rumination_time: r.rumination_time,
            rest_hours: r.rest_hours,
            body_temperature: r.body_temperature,
            heart_rate: r.heart_rate,
            vaccination_status: r.vaccination_status.clone(),
            temperature: r.ambient_temperature,
            humidity: r.humidity,
            season: r.season.clone(),
            housing_quality: r.housing_quality.clone(),
            milk_yield: labeled.milk_yield,
            disease_label: labeled.disease_label,
        }
    }
}

impl From<CsvRow> for LabeledRecord {
    fn from(row: CsvRow) -> Self {
        LabeledRecord {
            record: CattleRecord {
                animal_id: Some(row.animal_id).filter(|id| !id.is_empty()),
                breed: row.breed,
                age_months: row.age,
                weight_kg: row.weight,
                lactation_stage: row.lactation_stage,
                parity: row.parity,
                feed_type: row.feed_type,
                feed_quantity: row.feed_quantity,
                protein_content: row.protein_content,
                walking_distance: row.walking_distance,
                grazing_duration: row.grazing_duration,
                rumination_time: row.rumination_time,
                rest_hours: row.rest_hours,
                body_temperature: row.body_temperature,
                heart_rate: row.heart_rate,
                vaccination_status: row.vaccination_status,
                ambient_temperature: row.temperature,
                humidity: row.humidity,
                season: row.season,
                housing_quality: row.housing_quality,
            },
            milk_yield: row.milk_yield,
            disease_label: row.disease_label,
        }
    }
}

/// Labeled record table stored as a single CSV file
///
/// Writers are serialized through an internal mutex. Reads take the same
/// lock so they never observe a half-written append.
#[derive(Debug)]
pub struct CsvRecordStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read every record in file order
    pub fn read_all(&self) -> Result<Vec<LabeledRecord>, StoreError> {
        let _guard = self.guard();
        self.read_unlocked()
    }

    /// Latest record with the given id; later rows shadow earlier ones
    ///
    /// A table that does not exist yet holds no records.
    pub fn find(&self, animal_id: &str) -> Result<Option<LabeledRecord>, StoreError> {
        let records = match self.read_all() {
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(None)
            }
            result => result?,
        };
        Ok(records
            .into_iter()
            .rev()
            .find(|r| r.animal_id() == Some(animal_id)))
    }

    /// Append one record, creating the file with a header if needed
    pub fn append(&self, record: &LabeledRecord) -> Result<(), StoreError> {
        record.validate()?;
        let _guard = self.guard();

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(CsvRow::from(record))?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            animal_id = record.animal_id().unwrap_or_default(),
            "Appended record"
        );
        Ok(())
    }

    /// Replace the whole table; written to a temp file then renamed
    pub fn write_all(&self, records: &[LabeledRecord]) -> Result<(), StoreError> {
        let _guard = self.guard();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let temp_path = self.path.with_extension("csv.tmp");
        let file = File::create(&temp_path).map_err(|e| StoreError::io(&temp_path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        // explicit so an empty table still gets a header
        writer.write_record(COLUMNS)?;
        for record in records {
            writer.serialize(CsvRow::from(record))?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(&temp_path, e.into_error()))?;
        file.sync_all().map_err(|e| StoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            "Wrote record table"
        );
        Ok(())
    }

    fn read_unlocked(&self) -> Result<Vec<LabeledRecord>, StoreError> {
        let file = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers()?.clone();
        for column in COLUMNS {
            if !headers.iter().any(|h| h.trim() == column) {
                return Err(SchemaError::MissingColumn(column.to_string()).into());
            }
        }

        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            records.push(LabeledRecord::from(row?));
        }
        Ok(records)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // the guarded state is the file itself, so a poisoned lock is still usable
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, SyntheticGenerator};
    use crate::models::tests::sample_record;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn labeled(id: &str, milk_yield: f64) -> LabeledRecord {
        let mut record = sample_record();
        record.animal_id = Some(id.to_string());
        LabeledRecord {
            record,
            milk_yield,
            disease_label: DiseaseLabel::Healthy,
        }
    }

    #[test]
    fn test_write_then_read_preserves_records() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(dir.path().join("cattle_data.csv"));
        let records = SyntheticGenerator::new(GeneratorConfig { samples: 40, seed: 9 }).generate();

        store.write_all(&records).unwrap();
        assert_eq!(store.read_all().unwrap(), records);
    }

    #[test]
    fn test_header_uses_table_column_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cattle_data.csv");
        let store = CsvRecordStore::new(&path);
        store.write_all(&[labeled("CATTLE_1", 20.0)]).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(header, COLUMNS.join(","));
    }

    #[test]
    fn test_append_creates_file_and_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(dir.path().join("cattle_data.csv"));

        store.append(&labeled("CATTLE_1", 20.0)).unwrap();
        store.append(&labeled("CATTLE_2", 21.0)).unwrap();
        store.append(&labeled("CATTLE_1", 25.5)).unwrap();

        assert_eq!(store.read_all().unwrap().len(), 3);
        let found = store.find("CATTLE_1").unwrap().unwrap();
        assert_eq!(found.milk_yield, 25.5);
        assert!(store.find("CATTLE_9").unwrap().is_none());
    }

    #[test]
    fn test_append_rejects_invalid_record() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(dir.path().join("cattle_data.csv"));
        let mut record = labeled("CATTLE_1", 20.0);
        record.record.animal_id = None;

        assert!(matches!(
            store.append(&record),
            Err(StoreError::Schema(SchemaError::MissingField(_)))
        ));
        assert!(!store.exists());
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cattle_data.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Animal_ID,Breed,Age").unwrap();
        writeln!(file, "CATTLE_1,Holstein,40").unwrap();

        let store = CsvRecordStore::new(&path);
        assert!(matches!(
            store.read_all(),
            Err(StoreError::Schema(SchemaError::MissingColumn(ref c))) if c == "Weight"
        ));
    }

    fn with_humidity(path: &Path, humidity: &str) {
        let column = COLUMNS.iter().position(|c| *c == "Humidity").unwrap();
        let text = fs::read_to_string(path).unwrap();
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        let mut fields: Vec<&str> = lines[1].split(',').collect();
        fields[column] = humidity;
        lines[1] = fields.join(",");
        fs::write(path, lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_fractional_humidity_is_rounded_on_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cattle_data.csv");
        let store = CsvRecordStore::new(&path);
        store.write_all(&[labeled("CATTLE_1", 20.0)]).unwrap();

        with_humidity(&path, "61.3");
        assert_eq!(store.read_all().unwrap()[0].record.humidity, 61);

        with_humidity(&path, "72.5");
        assert_eq!(store.read_all().unwrap()[0].record.humidity, 73);

        with_humidity(&path, "140.2");
        assert!(store.read_all().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(dir.path().join("absent.csv"));
        assert!(matches!(store.read_all(), Err(StoreError::Io { .. })));
        assert_eq!(store.find("CATTLE_1000").unwrap(), None);
    }

    #[test]
    fn test_concurrent_appends_are_serialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CsvRecordStore::new(dir.path().join("cattle_data.csv")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..5 {
                        store
                            .append(&labeled(&format!("CATTLE_{}_{}", i, j), 10.0))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read_all().unwrap().len(), 40);
    }
}
