//! Offline training command

use anyhow::{Context, Result};
use herd_lib::training::{Trainer, TrainingConfig, TrainingOutcome};
use serde_json::json;
use tabled::Tabled;

use super::Paths;
use crate::output::{
    format_ratio, print_info, print_json, print_success, print_table, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct ClassRow {
    #[tabled(rename = "Condition")]
    label: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
    #[tabled(rename = "Support")]
    support: usize,
}

pub fn train(
    paths: &Paths,
    trees: Option<usize>,
    seed: Option<u64>,
    test_fraction: f64,
    format: OutputFormat,
) -> Result<()> {
    let mut config = TrainingConfig::default();
    if let Some(trees) = trees {
        config = config.with_trees(trees);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config.test_fraction = test_fraction;

    let outcome = Trainer::new(config)
        .run(&paths.records(), &paths.bundles())
        .with_context(|| format!("Training on {} failed", paths.data.display()))?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "model_dir": paths.model_dir.display().to_string(),
            "pipeline_rows": outcome.pipeline_rows,
            "yield": outcome.yield_eval,
            "disease": outcome.disease_eval,
        }))?,
        OutputFormat::Table => print_outcome(paths, &outcome),
    }

    Ok(())
}

fn print_outcome(paths: &Paths, outcome: &TrainingOutcome) {
    print_success(&format!(
        "Saved yield and disease bundles to {}",
        paths.model_dir.display()
    ));
    print_info(&format!(
        "Feature pipeline fitted on {} rows",
        outcome.pipeline_rows
    ));

    let yield_eval = &outcome.yield_eval;
    println!(
        "\nYield RMSE: {:.3} L (held-out std dev {:.3} L, {} rows)",
        yield_eval.rmse, yield_eval.baseline_std_dev, yield_eval.test_rows
    );
    if yield_eval.rmse >= yield_eval.baseline_std_dev {
        print_warning("Yield model does not beat a constant guess");
    }

    let disease_eval = &outcome.disease_eval;
    println!(
        "Disease accuracy: {} ({} rows)\n",
        format_ratio(disease_eval.accuracy),
        disease_eval.test_rows
    );
    let rows: Vec<ClassRow> = disease_eval
        .report
        .classes
        .iter()
        .map(|c| ClassRow {
            label: c.label.to_string(),
            precision: format!("{:.2}", c.precision),
            recall: format!("{:.2}", c.recall),
            f1: format!("{:.2}", c.f1),
            support: c.support,
        })
        .collect();
    print_table(rows);
    println!(
        "\nMacro F1: {:.2}  Weighted F1: {:.2}",
        disease_eval.report.macro_f1, disease_eval.report.weighted_f1
    );
}
