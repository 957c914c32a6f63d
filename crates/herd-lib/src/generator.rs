//! Synthetic labeled cattle records
//!
//! Breed sets a yield baseline, physiological attributes are drawn from
//! independent normals, and a disease label is assigned by rules on the
//! drawn values. The first 15 records are forced to 5 Mastitis, 5 Digestive
//! Disorder and 5 Heat Stress so every class exists for any sample count.
//!
//! The probabilistic triggers overlap; they are checked in a fixed priority
//! order (Mastitis, then Digestive Disorder, then Heat Stress) and the first
//! match wins.

use crate::models::{
    Breed, CattleRecord, DiseaseLabel, FeedType, HousingQuality, LabeledRecord, LactationStage,
    Season, VaccinationStatus,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_SAMPLES: usize = 500;
pub const DEFAULT_SEED: u64 = 42;

/// Records per forced disease class
pub const FORCED_PER_CLASS: usize = 5;

/// Chance that a record with a Mastitis trigger is labeled Mastitis
const MASTITIS_PROBABILITY: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub samples: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

/// Values the labeling rules read and may override
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Vitals {
    pub body_temperature: f64,
    pub rumination_time: f64,
    pub ambient_temperature: f64,
    pub humidity: f64,
    pub heart_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Diagnosis {
    pub label: DiseaseLabel,
    /// Multiplier on the breed baseline yield
    pub yield_factor: f64,
}

/// Label for record `index`, adjusting `vitals` to match
///
/// The first 15 records are forced, five per disease. After that the checks
/// run in a fixed order: Mastitis, Digestive Disorder, Heat Stress. The
/// first trigger that holds wins, so overlapping conditions resolve to the
/// earlier label.
///
/// The Mastitis gate only labels a record when a Mastitis trigger also
/// holds. An open gate without a trigger does not end the evaluation: the
/// record is still checked for Digestive Disorder and Heat Stress, so the
/// gate never masks a later rule. `vitals.humidity` must already be the
/// whole percentage that gets stored.
pub(crate) fn diagnose(
    index: usize,
    vitals: &mut Vitals,
    housing: &HousingQuality,
    feed: &FeedType,
    mastitis_roll: f64,
) -> Diagnosis {
    let forced = |label, yield_factor| Diagnosis { label, yield_factor };
    match index / FORCED_PER_CLASS {
        0 => {
            vitals.body_temperature = 40.5;
            return forced(DiseaseLabel::Mastitis, 0.5);
        }
        1 => {
            vitals.rumination_time = 3.0;
            return forced(DiseaseLabel::DigestiveDisorder, 0.7);
        }
        2 => {
            vitals.ambient_temperature = 38.0;
            vitals.humidity = 85.0;
            return forced(DiseaseLabel::HeatStress, 0.8);
        }
        _ => {}
    }

    let mastitis_trigger = vitals.body_temperature > 39.5 || *housing == HousingQuality::Poor;
    if mastitis_trigger && mastitis_roll < MASTITIS_PROBABILITY {
        return forced(DiseaseLabel::Mastitis, 0.6);
    }
    if vitals.rumination_time < 5.0 && *feed == FeedType::DryFodder {
        return forced(DiseaseLabel::DigestiveDisorder, 0.8);
    }
    if vitals.ambient_temperature > 35.0 && vitals.humidity > 70.0 {
        vitals.heart_rate += 15.0;
        return forced(DiseaseLabel::HeatStress, 0.85);
    }
    forced(DiseaseLabel::Healthy, 1.0)
}

/// Milk yield in liters, rounded to 2 decimals and never negative
pub(crate) fn milk_yield(
    breed: &Breed,
    stage: &LactationStage,
    yield_factor: f64,
    feed_quantity: f64,
    rumination_time: f64,
    noise: f64,
) -> f64 {
    if *stage == LactationStage::Dry {
        return 0.0;
    }
    let mut liters =
        breed.yield_baseline() * yield_factor + feed_quantity * 0.2 + rumination_time * 0.1 + noise;
    if *stage == LactationStage::Peak {
        liters *= 1.2;
    }
    let rounded = (liters * 100.0).round() / 100.0;
    if rounded > 0.0 {
        rounded
    } else {
        0.0
    }
}

/// Deterministic generator: the same config always yields the same table
pub struct SyntheticGenerator {
    config: GeneratorConfig,
    breeds: Vec<Breed>,
    stages: Vec<LactationStage>,
    feeds: Vec<FeedType>,
    seasons: Vec<Season>,
    housing: Vec<HousingQuality>,
    vaccination: Vec<VaccinationStatus>,
}

impl SyntheticGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            breeds: Breed::known(),
            stages: LactationStage::known(),
            feeds: FeedType::known(),
            seasons: Season::known(),
            housing: HousingQuality::known(),
            vaccination: VaccinationStatus::known(),
        }
    }

    pub fn generate(&self) -> Vec<LabeledRecord> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let records: Vec<LabeledRecord> = (0..self.config.samples)
            .map(|i| self.generate_one(i, &mut rng))
            .collect();

        let counts = label_counts(&records);
        info!(
            event = "synthetic_data_generated",
            samples = records.len(),
            seed = self.config.seed,
            healthy = counts.get(&DiseaseLabel::Healthy).copied().unwrap_or(0),
            mastitis = counts.get(&DiseaseLabel::Mastitis).copied().unwrap_or(0),
            digestive_disorder = counts.get(&DiseaseLabel::DigestiveDisorder).copied().unwrap_or(0),
            heat_stress = counts.get(&DiseaseLabel::HeatStress).copied().unwrap_or(0),
            "Generated synthetic cattle records"
        );
        records
    }

    fn generate_one(&self, index: usize, rng: &mut StdRng) -> LabeledRecord {
        let breed = pick(&self.breeds, rng);
        let age_months = rng.gen_range(24..=120);
        let weight_kg = gaussian(rng, 450.0, 50.0);
        let lactation_stage = pick(&self.stages, rng);
        let parity = rng.gen_range(1..=8);

        let feed_type = pick(&self.feeds, rng);
        let feed_quantity = gaussian(rng, 15.0, 3.0);
        let protein_content = gaussian(rng, 14.0, 2.0);

        let walking_distance = gaussian(rng, 2.0, 1.0);
        let grazing_duration = gaussian(rng, 4.0, 1.5);
        let rumination_time = gaussian(rng, 7.0, 1.0);
        let rest_hours = gaussian(rng, 10.0, 2.0);

        let season = pick(&self.seasons, rng);
        let ambient_temperature = gaussian(rng, 25.0, 5.0);
        // stored as a whole percentage, and the labelling rules see the stored value
        let humidity = gaussian(rng, 60.0, 15.0).round().clamp(0.0, 100.0);
        let housing_quality = pick(&self.housing, rng);

        let body_temperature = gaussian(rng, 38.5, 0.5);
        let heart_rate = gaussian(rng, 60.0, 10.0);
        let vaccination_status = pick(&self.vaccination, rng);

        let mut vitals = Vitals {
            body_temperature,
            rumination_time,
            ambient_temperature,
            humidity,
            heart_rate,
        };
        let mastitis_roll: f64 = rng.gen();
        let diagnosis = diagnose(index, &mut vitals, &housing_quality, &feed_type, mastitis_roll);

        let noise = gaussian(rng, 0.0, 1.5);
        let milk_yield = milk_yield(
            &breed,
            &lactation_stage,
            diagnosis.yield_factor,
            feed_quantity,
            vitals.rumination_time,
            noise,
        );

        LabeledRecord {
            record: CattleRecord {
                animal_id: Some(format!("CATTLE_{}", 1000 + index)),
                breed,
                age_months,
                weight_kg,
                lactation_stage,
                parity,
                feed_type,
                feed_quantity,
                protein_content,
                walking_distance,
                grazing_duration,
                rumination_time: vitals.rumination_time,
                rest_hours,
                body_temperature: vitals.body_temperature,
                heart_rate: vitals.heart_rate,
                vaccination_status,
                ambient_temperature: vitals.ambient_temperature,
                humidity: vitals.humidity as u32,
                season,
                housing_quality,
            },
            milk_yield,
            disease_label: diagnosis.label,
        }
    }
}

fn pick<T: Clone>(values: &[T], rng: &mut StdRng) -> T {
    // vocabularies are non-empty constants
    values.choose(rng).cloned().unwrap_or_else(|| values[0].clone())
}

fn gaussian(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + std_dev * z
}

/// Number of records per disease label
pub fn label_counts(records: &[LabeledRecord]) -> BTreeMap<DiseaseLabel, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.disease_label).or_insert(0) += 1;
    }
    counts
}
