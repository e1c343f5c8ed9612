use crate::core::matcher::normalize_label;
use crate::domain::model::{RawCell, SourceRecord, SpreadsheetRow};
use crate::utils::error::{OkrError, Result};

pub const MONTHS_PER_YEAR: usize = 12;

/// 來源欄位名稱對應
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub id_column: String,
    pub name_column: String,
    pub target_column: String,
    pub month_columns: Vec<String>,
}

/// SourceRecord → SpreadsheetRow；欄位名稱先精確比對，再忽略大小寫與重音比對
pub struct RowParser<'a> {
    columns: &'a ColumnMapping,
}

impl<'a> RowParser<'a> {
    pub fn new(columns: &'a ColumnMapping) -> Self {
        Self { columns }
    }

    pub fn parse(&self, records: &[SourceRecord]) -> Result<Vec<SpreadsheetRow>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let has_name_column = records
            .iter()
            .any(|r| lookup(r, &self.columns.name_column).is_some());
        if !has_name_column {
            return Err(OkrError::SourceError {
                message: format!("column '{}' not found in source", self.columns.name_column),
            });
        }

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let Some(raw_name) = lookup(record, &self.columns.name_column).and_then(RawCell::as_label)
            else {
                tracing::debug!("Skipping source row {} without a KR name", index + 1);
                continue;
            };

            let monthly_values = self
                .columns
                .month_columns
                .iter()
                .map(|col| lookup(record, col).cloned().unwrap_or(RawCell::Blank))
                .chain(std::iter::repeat(RawCell::Blank))
                .take(MONTHS_PER_YEAR)
                .collect();

            rows.push(SpreadsheetRow {
                id: lookup(record, &self.columns.id_column).and_then(RawCell::as_label),
                raw_name,
                meta_raw: lookup(record, &self.columns.target_column)
                    .cloned()
                    .unwrap_or(RawCell::Blank),
                monthly_values,
            });
        }

        tracing::debug!("Parsed {} spreadsheet rows from {} records", rows.len(), records.len());
        Ok(rows)
    }
}

fn lookup<'r>(record: &'r SourceRecord, column: &str) -> Option<&'r RawCell> {
    if let Some(cell) = record.data.get(column) {
        return Some(cell);
    }

    let wanted = normalize_label(column);
    let mut keys: Vec<&String> = record
        .data
        .keys()
        .filter(|k| normalize_label(k) == wanted)
        .collect();
    // HashMap 的順序不可外洩
    keys.sort();
    keys.first().and_then(|k| record.data.get(*k))
}
