use crate::config::toml_config::DashboardConfig;
use crate::core::assembler::DashboardAssembler;
use crate::core::matcher::MatchRules;
use crate::core::rows::{ColumnMapping, RowParser};
use crate::core::vocabulary::KrVocabulary;
use crate::domain::model::{
    DashboardReport, Diagnostic, DiagnosticReason, RowSnapshot, SourceRecord, SpreadsheetRow,
};
use crate::domain::ports::{Pipeline, RowSource, Storage};
use crate::utils::error::{OkrError, Result};
use serde::Serialize;

pub const JSON_FILENAME: &str = "dashboard.json";
pub const CSV_FILENAME: &str = "krs.csv";

/// 扁平化的 KR 輸出列（krs.csv）
#[derive(Debug, Serialize)]
struct KrCsvRow<'a> {
    objective: &'a str,
    kr: &'a str,
    current: &'a str,
    previous: &'a str,
    target: &'a str,
    delta: &'a str,
    progress_pct: u8,
    measured: bool,
    status: &'static str,
    matched_row: &'a str,
    confidence: String,
}

pub struct DashboardPipeline<R: RowSource, S: Storage, V: KrVocabulary> {
    source: R,
    storage: S,
    config: DashboardConfig,
    columns: ColumnMapping,
    rules: MatchRules,
    vocabulary: V,
}

impl<R: RowSource, S: Storage, V: KrVocabulary> DashboardPipeline<R, S, V> {
    pub fn new(source: R, storage: S, config: DashboardConfig, vocabulary: V) -> Self {
        Self {
            source,
            storage,
            columns: config.column_mapping(),
            rules: config.match_rules(),
            config,
            vocabulary,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// 解析失敗與來源不可用一樣處理：回傳 None 並附上原因
    fn parse_snapshot(&self, snapshot: RowSnapshot) -> (Option<Vec<SpreadsheetRow>>, Option<String>) {
        match snapshot {
            RowSnapshot::Loaded(records) => match RowParser::new(&self.columns).parse(&records) {
                Ok(rows) => (Some(rows), None),
                Err(e) => {
                    tracing::warn!("⚠️ Could not parse spreadsheet rows: {}", e);
                    (None, Some(e.to_string()))
                }
            },
            RowSnapshot::Unavailable { reason } => (None, Some(reason)),
        }
    }

    fn encode_csv(report: &DashboardReport) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for kr in report.kr_records() {
            let confidence = serde_json::to_value(kr.confidence)?
                .as_str()
                .unwrap_or_default()
                .to_string();
            writer.serialize(KrCsvRow {
                objective: kr.objective.as_deref().unwrap_or_default(),
                kr: &kr.name,
                current: &kr.current_display,
                previous: &kr.previous_display,
                target: &kr.target_display,
                delta: &kr.delta_display,
                progress_pct: kr.progress_pct,
                measured: kr.measured,
                status: kr.status.label(),
                matched_row: kr.matched_row.as_deref().unwrap_or_default(),
                confidence,
            })?;
        }
        writer.into_inner().map_err(|e| OkrError::ProcessingError {
            message: format!("CSV buffer flush failed: {}", e),
        })
    }
}

#[async_trait::async_trait]
impl<R: RowSource, S: Storage, V: KrVocabulary> Pipeline for DashboardPipeline<R, S, V> {
    async fn extract(&self) -> Result<Vec<SourceRecord>> {
        self.source.fetch_records().await
    }

    async fn transform(&self, snapshot: RowSnapshot) -> Result<DashboardReport> {
        let (rows, unavailable_reason) = self.parse_snapshot(snapshot);

        let assembler =
            DashboardAssembler::new(&self.config.objectives, &self.rules, &self.vocabulary);
        let assembled = assembler.assemble(rows.as_deref());

        let mut diagnostics = Vec::with_capacity(assembled.diagnostics.len() + 1);
        if let Some(message) = &unavailable_reason {
            tracing::warn!("⚠️ Data source unavailable, every KR degrades to no data: {}", message);
            diagnostics.push(Diagnostic {
                kr_name: None,
                objective: None,
                reason: DiagnosticReason::SourceUnavailable {
                    message: message.clone(),
                },
            });
        }
        diagnostics.extend(assembled.diagnostics);

        tracing::info!(
            "🔄 Assembled {} KRs across {} objectives ({} diagnostics)",
            assembled.summary.total_krs,
            assembled.objectives.len(),
            diagnostics.len()
        );

        Ok(DashboardReport {
            name: self.config.dashboard.name.clone(),
            generated_at: chrono::Utc::now(),
            source_available: unavailable_reason.is_none(),
            summary: assembled.summary,
            objectives: assembled.objectives,
            diagnostics,
        })
    }

    async fn load(&self, report: DashboardReport) -> Result<String> {
        for format in &self.config.load.output_formats {
            match format.as_str() {
                "json" => {
                    let json = serde_json::to_vec_pretty(&report)?;
                    self.storage.write_file(JSON_FILENAME, &json).await?;
                    tracing::info!("💾 Wrote {}", JSON_FILENAME);
                }
                "csv" => {
                    let csv = Self::encode_csv(&report)?;
                    self.storage.write_file(CSV_FILENAME, &csv).await?;
                    tracing::info!("💾 Wrote {}", CSV_FILENAME);
                }
                other => {
                    return Err(OkrError::InvalidConfigValueError {
                        field: "load.output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Unsupported output format".to_string(),
                    })
                }
            }
        }

        Ok(self.config.output_path().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MatchConfidence, RawCell, Status};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                OkrError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct StaticSource(Vec<SourceRecord>);

    #[async_trait::async_trait]
    impl RowSource for StaticSource {
        async fn fetch_records(&self) -> Result<Vec<SourceRecord>> {
            Ok(self.0.clone())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig::from_toml_str(
            r#"
[dashboard]
name = "OKRs"

[source]
path = "okrs.csv"
month_columns = ["Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez"]

[matching]
exact_only = ["Receita"]

[load]
output_path = "./output"
output_formats = ["json", "csv"]

[[objectives]]
title = "CRESCIMENTO"

[[objectives.krs]]
name = "Receita"

[[objectives.krs]]
name = "Taxa de conversão"
"#,
        )
        .unwrap()
    }

    fn records() -> Vec<SourceRecord> {
        vec![
            SourceRecord::from_pairs([
                ("KR", RawCell::text("Receita Nacional (NB)")),
                ("Meta", RawCell::text("R$ 8.5M")),
                ("Jan", RawCell::text("R$ 8.7M")),
            ]),
            SourceRecord::from_pairs([
                ("KR", RawCell::text("Receita")),
                ("Meta", RawCell::text("R$ 12.0M")),
                ("Jan", RawCell::text("R$ 11.8M")),
                ("Fev", RawCell::text("R$ 12.4M")),
            ]),
            SourceRecord::from_pairs([
                ("KR", RawCell::text("Taxa de conversão")),
                ("Meta", RawCell::Float(0.72)),
                ("Jan", RawCell::Float(0.725)),
            ]),
        ]
    }

    #[tokio::test]
    async fn test_transform_and_load() {
        let storage = MockStorage::new();
        let cfg = config();
        let vocabulary = cfg.vocabulary();
        let pipeline = DashboardPipeline::new(StaticSource(records()), storage.clone(), cfg, vocabulary);

        let records = pipeline.extract().await.unwrap();
        let report = pipeline.transform(RowSnapshot::Loaded(records)).await.unwrap();

        assert!(report.source_available);
        let krs: Vec<_> = report.kr_records().collect();
        assert_eq!(krs[0].current_display, "R$ 12.40M");
        assert_eq!(krs[0].previous_display, "R$ 11.80M");
        assert_eq!(krs[0].progress_pct, 100);
        assert_eq!(krs[0].confidence, MatchConfidence::Exact);
        assert_eq!(krs[1].current_display, "72.5%");
        assert_eq!(krs[1].target_display, "72%");
        assert_eq!(krs[1].status, Status::OnTrack);

        let output = pipeline.load(report).await.unwrap();
        assert_eq!(output, "./output");

        let csv = String::from_utf8(storage.get_file(CSV_FILENAME).await.unwrap()).unwrap();
        assert!(csv.starts_with("objective,kr,current,previous,target,delta,progress_pct,measured,status,matched_row,confidence"));
        assert!(csv.contains("CRESCIMENTO,Receita,R$ 12.40M,R$ 11.80M,R$ 12.00M,+R$ 600.0K,100,true,on track,Receita,exact"));

        let json: serde_json::Value =
            serde_json::from_slice(&storage.get_file(JSON_FILENAME).await.unwrap()).unwrap();
        assert_eq!(json["summary"]["total_krs"], 2);
    }

    #[tokio::test]
    async fn test_unavailable_snapshot_degrades() {
        let cfg = config();
        let vocabulary = cfg.vocabulary();
        let pipeline = DashboardPipeline::new(StaticSource(vec![]), MockStorage::new(), cfg, vocabulary);

        let report = pipeline
            .transform(RowSnapshot::Unavailable {
                reason: "File not found: okrs.csv".to_string(),
            })
            .await
            .unwrap();

        assert!(!report.source_available);
        assert!(report.kr_records().all(|k| k.status == Status::NoData && k.progress_pct == 0));
        assert!(matches!(
            report.diagnostics[0].reason,
            DiagnosticReason::SourceUnavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_unparseable_rows_degrade() {
        let cfg = config();
        let vocabulary = cfg.vocabulary();
        let bad = vec![SourceRecord::from_pairs([("Nome", RawCell::text("Receita"))])];
        let pipeline = DashboardPipeline::new(StaticSource(vec![]), MockStorage::new(), cfg, vocabulary);

        let report = pipeline.transform(RowSnapshot::Loaded(bad)).await.unwrap();
        assert!(!report.source_available);
        assert_eq!(report.summary.objectives_no_data, 1);
    }
}
