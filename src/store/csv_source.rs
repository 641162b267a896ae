// 📂 CSV Relation Source - one headered CSV file per relation
//
// Codes are standardized to 8 digits and names cleaned on the way in,
// so every downstream filter compares like with like.

use super::{DetailRow, RegistryRow, RelationSource, TabularStore, ValueRow};
use crate::period::Period;
use crate::text::{clean_text, non_empty, standardize_code};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Registry columns with a dedicated field; anything else is an attribute
const REGISTRY_STANDARD_COLUMNS: [&str; 6] = [
    "entity_code",
    "period",
    "institution_name",
    "prudential_group_code",
    "financial_group_code",
    "leader_code",
];

/// File names for the four relations inside the data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationFiles {
    pub entity_detail: String,
    pub group_detail: String,
    pub group_values: String,
    pub registry: String,
}

impl Default for RelationFiles {
    fn default() -> Self {
        RelationFiles {
            entity_detail: "entity_detail.csv".to_string(),
            group_detail: "group_detail.csv".to_string(),
            group_values: "group_values.csv".to_string(),
            registry: "registry.csv".to_string(),
        }
    }
}

pub struct CsvSource {
    dir: PathBuf,
    files: RelationFiles,
}

impl CsvSource {
    pub fn new(dir: impl Into<PathBuf>, files: RelationFiles) -> Self {
        CsvSource {
            dir: dir.into(),
            files,
        }
    }

    fn path_for(&self, file: &str) -> Result<PathBuf> {
        let path = self.dir.join(file);
        if !path.exists() {
            anyhow::bail!(
                "relation file not found: {:?} (check the configured data directory)",
                path
            );
        }
        Ok(path)
    }
}

impl RelationSource for CsvSource {
    fn load(&self) -> Result<TabularStore> {
        Ok(TabularStore {
            entity_detail: load_detail_csv(&self.path_for(&self.files.entity_detail)?)?,
            group_detail: load_detail_csv(&self.path_for(&self.files.group_detail)?)?,
            group_values: load_values_csv(&self.path_for(&self.files.group_values)?)?,
            registry: load_registry_csv(&self.path_for(&self.files.registry)?)?,
        })
    }

    fn describe(&self) -> String {
        format!("csv directory {:?}", self.dir)
    }
}

pub fn load_detail_csv(csv_path: &Path) -> Result<Vec<DetailRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {:?}", csv_path))?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let mut row: DetailRow = result.context("Failed to deserialize detail row")?;

        // Rows without a usable code cannot be matched by anything
        row.entity_code = match standardize_code(&row.entity_code) {
            Some(code) => code,
            None => continue,
        };
        row.institution_name = clean_text(&row.institution_name);
        row.account_name = clean_text(&row.account_name);

        rows.push(row);
    }

    Ok(rows)
}

pub fn load_values_csv(csv_path: &Path) -> Result<Vec<ValueRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {:?}", csv_path))?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let mut row: ValueRow = result.context("Failed to deserialize values row")?;

        // Group codes are free text; only trim them
        row.filter_code = match non_empty(&row.filter_code) {
            Some(code) => code,
            None => continue,
        };
        row.account_name = clean_text(&row.account_name);

        rows.push(row);
    }

    Ok(rows)
}

pub fn load_registry_csv(csv_path: &Path) -> Result<Vec<RegistryRow>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {:?}", csv_path))?;

    let headers = rdr.headers().context("Failed to read registry headers")?.clone();
    for required in ["entity_code", "period", "institution_name"] {
        if !headers.iter().any(|h| h == required) {
            anyhow::bail!("registry file {:?} lacks column '{}'", csv_path, required);
        }
    }

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.context("Failed to read registry record")?;

        let cells: BTreeMap<&str, &str> = headers.iter().zip(record.iter()).collect();
        let cell = |name: &str| cells.get(name).copied().unwrap_or("");

        let entity_code = match standardize_code(cell("entity_code")) {
            Some(code) => code,
            None => continue,
        };
        let period: Period = cell("period")
            .trim()
            .parse()
            .with_context(|| format!("Invalid period on registry line {}", line + 2))?;

        let attributes = cells
            .iter()
            .filter(|(name, _)| !REGISTRY_STANDARD_COLUMNS.contains(*name))
            .filter_map(|(name, raw)| non_empty(raw).map(|v| (name.to_string(), v)))
            .collect();

        rows.push(RegistryRow {
            entity_code,
            period,
            institution_name: clean_text(cell("institution_name")),
            prudential_group_code: non_empty(cell("prudential_group_code")),
            financial_group_code: non_empty(cell("financial_group_code")),
            leader_code: standardize_code(cell("leader_code")),
            attributes,
        });
    }

    Ok(rows)
}
