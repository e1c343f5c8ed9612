//! 試算表來源：透過 Storage 讀取位元組，再依格式解碼成 SourceRecord

use crate::domain::model::{RawCell, SourceRecord};
use crate::domain::ports::{RowSource, Storage};
use crate::utils::error::{OkrError, Result};
use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
    Json,
}

impl SourceFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" => Ok(SourceFormat::Xlsx),
            "json" => Ok(SourceFormat::Json),
            other => Err(OkrError::InvalidConfigValueError {
                field: "source.format".to_string(),
                value: other.to_string(),
                reason: "Valid formats: csv, xlsx, json".to_string(),
            }),
        }
    }

    /// 依副檔名推斷格式
    pub fn from_path(path: &str) -> Result<Self> {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| OkrError::InvalidConfigValueError {
                field: "source.path".to_string(),
                value: path.to_string(),
                reason: "Cannot infer format without a file extension".to_string(),
            })?;
        Self::parse(extension)
    }

    /// 明確設定優先，否則看副檔名
    pub fn resolve(explicit: Option<&str>, path: &str) -> Result<Self> {
        match explicit {
            Some(format) => Self::parse(format),
            None => Self::from_path(path),
        }
    }
}

/// 格式在讀取時才決定：無法判斷格式與檔案不存在一樣屬於來源不可用
pub struct FileRowSource<S: Storage> {
    storage: S,
    path: String,
    format: Option<String>,
    sheet: String,
}

impl<S: Storage> FileRowSource<S> {
    pub fn new(storage: S, path: String, format: Option<String>, sheet: String) -> Self {
        Self {
            storage,
            path,
            format,
            sheet,
        }
    }

    pub fn format(&self) -> Result<SourceFormat> {
        SourceFormat::resolve(self.format.as_deref(), &self.path).map_err(|e| OkrError::SourceError {
            message: format!("cannot determine the format of '{}': {}", self.path, e),
        })
    }
}

#[async_trait]
impl<S: Storage> RowSource for FileRowSource<S> {
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>> {
        tracing::info!("📂 Reading OKR spreadsheet: {}", self.describe());
        let format = self.format()?;
        let bytes = self.storage.read_file(&self.path).await?;

        let records = match format {
            SourceFormat::Csv => decode_csv(&bytes)?,
            SourceFormat::Xlsx => decode_xlsx(bytes, &self.sheet)?,
            SourceFormat::Json => decode_json(&bytes)?,
        };

        tracing::info!("📋 Read {} rows from {}", records.len(), self.path);
        Ok(records)
    }

    fn describe(&self) -> String {
        match self.format() {
            Ok(SourceFormat::Xlsx) => format!("{} (sheet '{}')", self.path, self.sheet),
            _ => self.path.clone(),
        }
    }
}

fn text_cell(value: &str) -> RawCell {
    if value.trim().is_empty() {
        RawCell::Blank
    } else {
        RawCell::text(value)
    }
}

pub fn decode_csv(bytes: &[u8]) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let data: HashMap<String, RawCell> = headers
            .iter()
            .zip(row.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), text_cell(value)))
            .collect();
        records.push(SourceRecord { data });
    }
    Ok(records)
}

fn xlsx_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Blank,
        Data::Int(i) => RawCell::Int(*i),
        Data::Float(f) => RawCell::Float(*f),
        Data::String(s) => text_cell(s),
        other => RawCell::text(other.to_string()),
    }
}

pub fn decode_xlsx(bytes: Vec<u8>, sheet: &str) -> Result<Vec<SourceRecord>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(OkrError::SourceError {
            message: format!("sheet '{}' not found in workbook", sheet),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let records = rows
        .map(|row| {
            let data = headers
                .iter()
                .zip(row.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), xlsx_cell(cell)))
                .collect();
            SourceRecord { data }
        })
        .collect();
    Ok(records)
}

pub fn decode_json(bytes: &[u8]) -> Result<Vec<SourceRecord>> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_slice(bytes)?;
    Ok(rows
        .iter()
        .map(|row| SourceRecord {
            data: row
                .iter()
                .map(|(key, value)| (key.trim().to_string(), RawCell::from(value)))
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_resolution() {
        assert_eq!(SourceFormat::from_path("okrs.XLSX").unwrap(), SourceFormat::Xlsx);
        assert_eq!(SourceFormat::resolve(Some("csv"), "okrs.xlsx").unwrap(), SourceFormat::Csv);
        assert!(SourceFormat::from_path("okrs").is_err());
        assert!(SourceFormat::parse("ods").is_err());
    }

    #[tokio::test]
    async fn test_unknown_format_is_a_source_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = crate::adapters::LocalStorage::new(temp_dir.path().to_string_lossy().to_string());
        storage.write_file("okrs.ods", b"ID,KR").await.unwrap();

        let source = FileRowSource::new(storage, "okrs.ods".to_string(), None, "OKRs".to_string());
        let err = source.fetch_records().await.unwrap_err();
        assert!(matches!(err, OkrError::SourceError { .. }));
        assert_eq!(source.describe(), "okrs.ods");
    }

    #[test]
    fn test_decode_csv() {
        let csv = "ID,KR,Meta,Janeiro,Fevereiro\n1,Receita,R$ 12.0M,R$ 8.1M,\n2,NPS,+75,72,70\n";
        let records = decode_csv(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].data["KR"], RawCell::text("Receita"));
        assert_eq!(records[0].data["Fevereiro"], RawCell::Blank);
        assert_eq!(records[1].data["Meta"], RawCell::text("+75"));
    }

    #[test]
    fn test_decode_json() {
        let json = r#"[{"KR": "CSAT", "Meta": "4.5/5", "Janeiro": 4.2, "Fevereiro": null, "ID": 3}]"#;
        let records = decode_json(json.as_bytes()).unwrap();

        assert_eq!(records[0].data["Janeiro"], RawCell::Float(4.2));
        assert_eq!(records[0].data["Fevereiro"], RawCell::Blank);
        assert_eq!(records[0].data["ID"], RawCell::Int(3));
    }

    #[test]
    fn test_decode_json_rejects_non_array() {
        assert!(decode_json(br#"{"KR": "CSAT"}"#).is_err());
    }

    #[test]
    fn test_decode_xlsx_rejects_garbage() {
        assert!(decode_xlsx(b"not a workbook".to_vec(), "OKRs").is_err());
    }
}
