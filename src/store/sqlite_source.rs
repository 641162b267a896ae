// 🗃️ SQLite Relation Source - the four relations as tables of one database file
//
// Same columns as the CSV layout. Codes may be stored as INTEGER or TEXT,
// so cells are read as dynamic values and normalized like the CSV loader does.

use super::{DetailRow, RegistryRow, RelationSource, TabularStore, ValueRow};
use crate::period::Period;
use crate::text::{clean_text, non_empty, standardize_code};
use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use std::collections::BTreeMap;
use std::path::PathBuf;

const DETAIL_COLUMNS: &str =
    "entity_code, period, account_name, account_code, document_code, value, institution_name";

pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteSource { path: path.into() }
    }

    fn open(&self) -> Result<Connection> {
        if !self.path.exists() {
            anyhow::bail!("database not found at {:?}", self.path);
        }
        Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open database {:?}", self.path))
    }
}

impl RelationSource for SqliteSource {
    fn load(&self) -> Result<TabularStore> {
        let conn = self.open()?;

        Ok(TabularStore {
            entity_detail: load_detail_table(&conn, "entity_detail")?,
            group_detail: load_detail_table(&conn, "group_detail")?,
            group_values: load_values_table(&conn)?,
            registry: load_registry_table(&conn)?,
        })
    }

    fn describe(&self) -> String {
        format!("sqlite database {:?}", self.path)
    }
}

// ============================================================================
// CELL CONVERSION
// ============================================================================

/// Render any SQLite cell as trimmed text; NULL and blanks are absent
fn text_cell(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => non_empty(&s),
        Value::Blob(_) => None,
    })
}

fn number_cell(row: &Row, idx: usize) -> rusqlite::Result<Option<f64>> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Integer(i) => Some(i as f64),
        Value::Real(f) => Some(f),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    })
}

/// Integral cell; NULL, fractional and unparseable cells are absent
fn integer_cell(row: &Row, idx: usize) -> rusqlite::Result<Option<i64>> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Integer(i) => Some(i),
        Value::Real(f) if f.fract() == 0.0 => Some(f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Mandatory integer column, narrowed to the row field's type
fn required<T: TryFrom<i64>>(cell: Option<i64>, table: &str, column: &str, line: usize) -> Result<T> {
    let raw = cell.with_context(|| {
        format!("Missing or non-integer {} in '{}' row {}", column, table, line)
    })?;
    T::try_from(raw)
        .ok()
        .with_context(|| format!("{} {} out of range in '{}' row {}", column, raw, table, line))
}

// ============================================================================
// TABLE LOADERS
// ============================================================================

fn load_detail_table(conn: &Connection, table: &str) -> Result<Vec<DetailRow>> {
    let sql = format!("SELECT {} FROM {}", DETAIL_COLUMNS, table);
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Failed to query table '{}'", table))?;

    let raw_rows = stmt.query_map([], |row| {
        Ok((
            text_cell(row, 0)?,
            integer_cell(row, 1)?,
            text_cell(row, 2)?,
            integer_cell(row, 3)?,
            integer_cell(row, 4)?,
            number_cell(row, 5)?,
            text_cell(row, 6)?,
        ))
    })?;

    let mut rows = Vec::new();
    for (line, raw) in raw_rows.enumerate() {
        let (code, period, account_name, account_code, document, value, name) =
            raw.with_context(|| format!("Failed to read row from '{}'", table))?;
        let period: Period = required(period, table, "period", line + 1)?;
        let account_code: i64 = required(account_code, table, "account_code", line + 1)?;
        let document_code: u32 = required(document, table, "document_code", line + 1)?;

        let entity_code = match code.as_deref().and_then(standardize_code) {
            Some(c) => c,
            None => continue,
        };

        rows.push(DetailRow {
            entity_code,
            period,
            account_name: clean_text(account_name.as_deref().unwrap_or("")),
            account_code,
            document_code,
            value,
            institution_name: clean_text(name.as_deref().unwrap_or("")),
        });
    }

    Ok(rows)
}

fn load_values_table(conn: &Connection) -> Result<Vec<ValueRow>> {
    let mut stmt = conn
        .prepare("SELECT filter_code, period, account_name, account_code, value FROM group_values")
        .context("Failed to query table 'group_values'")?;

    let raw_rows = stmt.query_map([], |row| {
        Ok((
            text_cell(row, 0)?,
            integer_cell(row, 1)?,
            text_cell(row, 2)?,
            integer_cell(row, 3)?,
            number_cell(row, 4)?,
        ))
    })?;

    let mut rows = Vec::new();
    for (line, raw) in raw_rows.enumerate() {
        let (code, period, account_name, account_code, value) =
            raw.context("Failed to read row from 'group_values'")?;
        let period: Period = required(period, "group_values", "period", line + 1)?;
        let account_code: i64 = required(account_code, "group_values", "account_code", line + 1)?;

        let filter_code = match code {
            Some(c) => c,
            None => continue,
        };

        rows.push(ValueRow {
            filter_code,
            period,
            account_name: clean_text(account_name.as_deref().unwrap_or("")),
            account_code,
            value,
        });
    }

    Ok(rows)
}

fn load_registry_table(conn: &Connection) -> Result<Vec<RegistryRow>> {
    let mut stmt = conn
        .prepare("SELECT * FROM registry")
        .context("Failed to query table 'registry'")?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let index_of = |name: &str| columns.iter().position(|c| c == name);

    let code_idx = index_of("entity_code").context("registry lacks column 'entity_code'")?;
    let period_idx = index_of("period").context("registry lacks column 'period'")?;
    let name_idx = index_of("institution_name").context("registry lacks column 'institution_name'")?;
    let prudential_idx = index_of("prudential_group_code");
    let financial_idx = index_of("financial_group_code");
    let leader_idx = index_of("leader_code");

    let standard: Vec<usize> = [
        Some(code_idx),
        Some(period_idx),
        Some(name_idx),
        prudential_idx,
        financial_idx,
        leader_idx,
    ]
    .into_iter()
    .flatten()
    .collect();

    let optional_text = |row: &Row, idx: Option<usize>| -> rusqlite::Result<Option<String>> {
        match idx {
            Some(i) => text_cell(row, i),
            None => Ok(None),
        }
    };

    let raw_rows = stmt.query_map([], |row| {
        let mut attributes = BTreeMap::new();
        for (idx, column) in columns.iter().enumerate() {
            if standard.contains(&idx) {
                continue;
            }
            if let Some(v) = text_cell(row, idx)? {
                attributes.insert(column.clone(), v);
            }
        }

        Ok((
            text_cell(row, code_idx)?,
            integer_cell(row, period_idx)?,
            text_cell(row, name_idx)?,
            optional_text(row, prudential_idx)?,
            optional_text(row, financial_idx)?,
            optional_text(row, leader_idx)?,
            attributes,
        ))
    })?;

    let mut rows = Vec::new();
    for (line, raw) in raw_rows.enumerate() {
        let (code, period, name, prudential, financial, leader, attributes) =
            raw.context("Failed to read row from 'registry'")?;
        let period: Period = required(period, "registry", "period", line + 1)?;

        let entity_code = match code.as_deref().and_then(standardize_code) {
            Some(c) => c,
            None => continue,
        };

        rows.push(RegistryRow {
            entity_code,
            period,
            institution_name: clean_text(name.as_deref().unwrap_or("")),
            prudential_group_code: prudential,
            financial_group_code: financial,
            leader_code: leader.as_deref().and_then(standardize_code),
            attributes,
        });
    }

    Ok(rows)
}
