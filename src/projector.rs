//! `project`: copy selected columns of a JSON speaker list into a
//! spreadsheet.

use color_eyre::eyre::{bail, WrapErr};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    config::ProjectorConfig,
    sheet::{self, Cell, Table},
};

/// Stand-in data used when the input file doesn't exist.
pub fn sample_records() -> Vec<Value> {
    vec![
        json!({"speaker_uuid": "...", "speaker_name": "데리온(분노)", "saas_name": null, "description": "..."}),
        json!({"speaker_uuid": "...", "speaker_name": "실라린(분노)", "saas_name": null, "description": "..."}),
        json!({"speaker_uuid": "...", "speaker_name": "실라린(행복)", "saas_name": null, "description": "..."}),
    ]
}

fn to_cell(value: Option<&Value>) -> Cell {
    match value {
        None | Some(Value::Null) => Cell::Blank,
        Some(Value::String(s)) => Cell::Text(s.clone()),
        Some(Value::Bool(b)) => Cell::Bool(*b),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Cell::Number)
            .unwrap_or_else(|| Cell::Text(n.to_string())),
        Some(other) => Cell::Text(other.to_string()),
    }
}

/// Keeps the target columns that appear in at least one record, in target
/// order, and one row per record.
pub fn project(records: &[Value], targets: &[String]) -> Table {
    let present = |column: &str| records.iter().any(|r| r.get(column).is_some());
    let columns: Vec<String> = targets
        .iter()
        .filter(|c| present(c))
        .cloned()
        .collect();

    let rows = records
        .iter()
        .map(|record| columns.iter().map(|c| to_cell(record.get(c))).collect())
        .collect();

    Table {
        rows,
        ..Table::new(columns)
    }
}

fn load(config: &ProjectorConfig) -> color_eyre::Result<Vec<Value>> {
    let path = &config.input_json;
    if !path.exists() {
        warn!(
            "{} not found, continuing with built-in sample data",
            path.display()
        );
        return Ok(sample_records());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .wrap_err_with(|| format!("{} is not valid JSON", path.display()))?;
    let Value::Array(records) = value else {
        bail!("{} must contain a JSON array of speakers", path.display());
    };
    if let Some(i) = records.iter().position(|r| !r.is_object()) {
        bail!("{}: entry {i} is not an object", path.display());
    }
    Ok(records)
}

pub fn run(config: &ProjectorConfig) -> color_eyre::Result<Table> {
    let records = load(config)?;
    let table = project(&records, &config.target_columns);

    let dropped: Vec<&String> = config
        .target_columns
        .iter()
        .filter(|c| !table.headers.contains(c))
        .collect();
    if !dropped.is_empty() {
        warn!("columns not present in the input, dropped: {dropped:?}");
    }

    sheet::write_table(&table, &config.output_xlsx)?;
    info!(
        "saved {} ({} rows, columns {:?})",
        config.output_xlsx.display(),
        table.rows.len(),
        table.headers
    );
    Ok(table)
}
