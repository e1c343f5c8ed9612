pub mod assembler;
pub mod etl;
pub mod matcher;
pub mod normalizer;
pub mod pipeline;
pub mod progress;
pub mod rows;
pub mod status;
pub mod vocabulary;

pub use crate::domain::model::{DashboardReport, RowSnapshot, SourceRecord};
pub use crate::domain::ports::{Pipeline, RowSource, Storage};
pub use crate::utils::error::Result;
