//! Bundle metadata listing

use anyhow::Result;
use herd_lib::predictor::BundleKind;
use serde_json::json;
use tabled::Tabled;

use super::Paths;
use crate::output::{print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled)]
struct BundleRow {
    #[tabled(rename = "Model")]
    kind: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Train Rows")]
    training_rows: String,
    #[tabled(rename = "Test Rows")]
    test_rows: String,
    #[tabled(rename = "Features")]
    feature_width: String,
    #[tabled(rename = "Trees")]
    n_trees: String,
    #[tabled(rename = "Metric")]
    metric: String,
}

pub fn inspect(paths: &Paths, format: OutputFormat) -> Result<()> {
    let store = paths.bundles();
    let entries: Vec<_> = BundleKind::ALL
        .into_iter()
        .map(|kind| (kind, store.metadata(kind)))
        .collect();

    match format {
        OutputFormat::Json => {
            let listing: Vec<_> = entries
                .iter()
                .map(|(kind, result)| match result {
                    Ok(meta) => json!({ "kind": kind, "available": true, "metadata": meta }),
                    Err(e) => json!({ "kind": kind, "available": false, "error": e.to_string() }),
                })
                .collect();
            print_json(&listing)?;
        }
        OutputFormat::Table => {
            let mut rows = Vec::new();
            for (kind, result) in &entries {
                match result {
                    Ok(meta) => rows.push(BundleRow {
                        kind: kind.to_string(),
                        created_at: meta.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        training_rows: meta.training_rows.to_string(),
                        test_rows: meta.test_rows.to_string(),
                        feature_width: meta.feature_width.to_string(),
                        n_trees: meta.n_trees.to_string(),
                        metric: format!("{} {:.3}", meta.metric_name, meta.metric_value),
                    }),
                    Err(e) => print_warning(&format!(
                        "{} bundle at {} unavailable: {}",
                        kind,
                        store.path(*kind).display(),
                        e
                    )),
                }
            }
            if !rows.is_empty() {
                print_table(rows);
            }
        }
    }

    Ok(())
}
