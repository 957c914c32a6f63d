//! Local predictions from the saved bundles

use anyhow::{Context, Result};
use clap::ValueEnum;
use herd_lib::predictor::{DiseasePrediction, PredictionService, RiskLevel, YieldPrediction};
use herd_lib::{CattleRecord, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tabled::Tabled;

use super::Paths;
use crate::output::{
    color_condition, color_confidence, format_liters, print_json, print_table, OutputFormat,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Yield,
    Disease,
    Both,
}

impl Target {
    fn wants_yield(self) -> bool {
        matches!(self, Target::Yield | Target::Both)
    }

    fn wants_disease(self) -> bool {
        matches!(self, Target::Disease | Target::Both)
    }
}

/// Either a single record or a batch
#[derive(Deserialize)]
#[serde(untagged)]
enum Input {
    One(Box<CattleRecord>),
    Many(Vec<CattleRecord>),
}

#[derive(Serialize)]
struct PredictionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    animal_id: Option<String>,
    #[serde(rename = "yield", skip_serializing_if = "Option::is_none")]
    yield_prediction: Option<YieldPrediction>,
    #[serde(rename = "disease", skip_serializing_if = "Option::is_none")]
    disease_prediction: Option<DiseasePrediction>,
}

#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Animal")]
    animal: String,
    #[tabled(rename = "Yield")]
    milk_yield: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Risk")]
    risk: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

pub fn predict(paths: &Paths, input: &Path, target: Target, format: OutputFormat) -> Result<()> {
    let records = read_records(input)?;
    let service = PredictionService::load(&paths.bundles(), StructuredLogger::new("herd-cli"));

    let mut entries = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let label = record
            .animal_id
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1));
        let yield_prediction = if target.wants_yield() {
            Some(
                service
                    .predict_yield(record)
                    .with_context(|| format!("Yield prediction for {} failed", label))?,
            )
        } else {
            None
        };
        let disease_prediction = if target.wants_disease() {
            Some(
                service
                    .predict_disease(record)
                    .with_context(|| format!("Disease prediction for {} failed", label))?,
            )
        } else {
            None
        };
        entries.push(PredictionEntry {
            animal_id: record.animal_id.clone(),
            yield_prediction,
            disease_prediction,
        });
    }

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            let rows = entries
                .iter()
                .enumerate()
                .map(|(index, entry)| to_row(index, entry))
                .collect();
            print_table(rows);
        }
    }

    Ok(())
}

fn to_row(index: usize, entry: &PredictionEntry) -> PredictionRow {
    let dash = || "-".to_string();
    let disease = entry.disease_prediction.as_ref();
    PredictionRow {
        animal: entry
            .animal_id
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1)),
        milk_yield: entry
            .yield_prediction
            .as_ref()
            .map(|p| format_liters(p.predicted_milk_yield_liters))
            .unwrap_or_else(dash),
        condition: disease
            .map(|p| color_condition(p.predicted_condition))
            .unwrap_or_else(dash),
        risk: disease
            .map(|p| match p.risk_assessment {
                RiskLevel::High => "High".to_string(),
                RiskLevel::Low => "Low".to_string(),
            })
            .unwrap_or_else(dash),
        confidence: disease
            .map(|p| color_confidence(p.confidence_of(p.predicted_condition)))
            .unwrap_or_else(dash),
    }
}

fn read_records(input: &Path) -> Result<Vec<CattleRecord>> {
    let content = if input.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read records from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    parse_records(&content)
}

fn parse_records(content: &str) -> Result<Vec<CattleRecord>> {
    let input: Input = serde_json::from_str(content)
        .context("Input is not a cattle record or array of records")?;
    Ok(match input {
        Input::One(record) => vec![*record],
        Input::Many(records) => records,
    })
}
