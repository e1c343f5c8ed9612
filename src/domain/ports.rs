use crate::domain::model::{DashboardReport, RowSnapshot, SourceRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 試算表（或其匯出檔）的讀取介面，核心邏輯不直接碰檔案
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<SourceRecord>>;

    fn describe(&self) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceRecord>>;
    async fn transform(&self, snapshot: RowSnapshot) -> Result<DashboardReport>;
    async fn load(&self, report: DashboardReport) -> Result<String>;
}
