//! Record lookup by animal id

use anyhow::{bail, Result};
use tabled::Tabled;

use super::Paths;
use crate::output::{format_liters, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

pub fn lookup(paths: &Paths, animal_id: &str, format: OutputFormat) -> Result<()> {
    let Some(found) = paths.records().find(animal_id)? else {
        bail!(
            "No record found for animal '{}' in {}",
            animal_id,
            paths.data.display()
        );
    };

    match format {
        OutputFormat::Json => print_json(&found)?,
        OutputFormat::Table => {
            let record = &found.record;
            let rows = vec![
                ("Animal ID", animal_id.to_string()),
                ("Breed", record.breed.to_string()),
                ("Age (months)", record.age_months.to_string()),
                ("Weight (kg)", format!("{:.1}", record.weight_kg)),
                ("Lactation stage", record.lactation_stage.to_string()),
                ("Parity", record.parity.to_string()),
                (
                    "Feed",
                    format!(
                        "{} ({:.1} kg, {:.1}% protein)",
                        record.feed_type, record.feed_quantity, record.protein_content
                    ),
                ),
                ("Body temperature", format!("{:.1} °C", record.body_temperature)),
                ("Heart rate", format!("{:.0} bpm", record.heart_rate)),
                ("Rumination (min)", format!("{:.0}", record.rumination_time)),
                (
                    "Ambient",
                    format!(
                        "{:.1} °C, {}% humidity, {}",
                        record.ambient_temperature, record.humidity, record.season
                    ),
                ),
                ("Housing", record.housing_quality.to_string()),
                ("Vaccination", record.vaccination_status.to_string()),
                ("Milk yield", format_liters(found.milk_yield)),
                ("Condition", found.disease_label.to_string()),
            ];
            print_table(
                rows.into_iter()
                    .map(|(field, value)| FieldRow {
                        field: field.to_string(),
                        value,
                    })
                    .collect(),
            );
        }
    }

    Ok(())
}
