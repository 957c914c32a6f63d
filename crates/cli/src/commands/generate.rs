//! Synthetic herd generation

use anyhow::{Context, Result};
use herd_lib::generator::{label_counts, GeneratorConfig, SyntheticGenerator};
use serde::Serialize;
use tabled::Tabled;

use super::Paths;
use crate::output::{print_info, print_json, print_success, print_table, OutputFormat};

#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "Condition")]
    label: String,
    #[tabled(rename = "Records")]
    count: usize,
    #[tabled(rename = "Share")]
    share: String,
}

#[derive(Serialize)]
struct GenerateSummary {
    path: String,
    samples: usize,
    seed: u64,
    labels: Vec<(String, usize)>,
}

pub fn generate(paths: &Paths, samples: usize, seed: u64, format: OutputFormat) -> Result<()> {
    let records = SyntheticGenerator::new(GeneratorConfig { samples, seed }).generate();
    paths
        .records()
        .write_all(&records)
        .with_context(|| format!("Failed to write {}", paths.data.display()))?;

    let counts = label_counts(&records);

    match format {
        OutputFormat::Json => print_json(&GenerateSummary {
            path: paths.data.display().to_string(),
            samples: records.len(),
            seed,
            labels: counts
                .iter()
                .map(|(label, count)| (label.to_string(), *count))
                .collect(),
        })?,
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote {} records to {}",
                records.len(),
                paths.data.display()
            ));
            let total = records.len().max(1) as f64;
            let rows: Vec<LabelRow> = counts
                .iter()
                .map(|(label, &count)| LabelRow {
                    label: label.to_string(),
                    count,
                    share: format!("{:.1}%", count as f64 / total * 100.0),
                })
                .collect();
            print_table(rows);
            print_info(&format!("Seed: {}", seed));
        }
    }

    Ok(())
}
