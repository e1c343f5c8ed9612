use crate::core::Pipeline;
use crate::domain::model::{DashboardReport, RowSnapshot};
use crate::utils::error::Result;

pub struct DashboardEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> DashboardEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Extract + Transform。讀取失敗不會中止，改以「無資料」組出報告
    pub async fn build_report(&self) -> Result<DashboardReport> {
        tracing::info!("📥 Extracting spreadsheet rows...");
        let snapshot = match self.pipeline.extract().await {
            Ok(records) => {
                tracing::info!("Extracted {} records", records.len());
                RowSnapshot::Loaded(records)
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Extraction failed ({:?}): {}. 💡 {}",
                    e.category(),
                    e,
                    e.recovery_suggestion()
                );
                RowSnapshot::Unavailable {
                    reason: e.to_string(),
                }
            }
        };

        tracing::info!("🔄 Matching KRs and normalizing values...");
        self.pipeline.transform(snapshot).await
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("🚀 Starting OKR dashboard build");
        let report = self.build_report().await?;

        tracing::info!("📤 Loading dashboard outputs...");
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}
