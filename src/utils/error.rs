use thiserror::Error;

#[derive(Error, Debug)]
pub enum OkrError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("XLSX processing error: {0}")]
    XlsxError(#[from] calamine::XlsxError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data source error: {message}")]
    SourceError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Source,
    Io,
    Serialization,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl OkrError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OkrError::ConfigValidationError { .. }
            | OkrError::InvalidConfigValueError { .. }
            | OkrError::MissingConfigError { .. } => ErrorCategory::Config,
            OkrError::CsvError(_) | OkrError::XlsxError(_) | OkrError::SourceError { .. } => {
                ErrorCategory::Source
            }
            OkrError::IoError(_) => ErrorCategory::Io,
            OkrError::SerializationError(_) => ErrorCategory::Serialization,
            OkrError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 資料來源問題會降級為「無資料」，不會中止儀表板
            ErrorCategory::Source => ErrorSeverity::Low,
            ErrorCategory::Io => ErrorSeverity::Medium,
            ErrorCategory::Serialization | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Config => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            OkrError::IoError(_) => {
                "Check that the path exists and that the process can read/write it".to_string()
            }
            OkrError::CsvError(_) => {
                "Check that the CSV has a header row and consistent column counts".to_string()
            }
            OkrError::XlsxError(_) => {
                "Check the workbook is a valid .xlsx file and the configured sheet exists"
                    .to_string()
            }
            OkrError::SerializationError(_) => {
                "Check that the JSON source is an array of row objects".to_string()
            }
            OkrError::ConfigValidationError { field, .. }
            | OkrError::InvalidConfigValueError { field, .. } => {
                format!("Fix '{}' in the dashboard configuration file", field)
            }
            OkrError::MissingConfigError { field } => {
                format!("Add '{}' to the dashboard configuration file", field)
            }
            OkrError::SourceError { .. } => {
                "Verify the spreadsheet export and the [source] column names".to_string()
            }
            OkrError::ProcessingError { .. } => {
                "Re-run with --verbose and inspect the diagnostics".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Config => format!("Invalid dashboard configuration: {}", self),
            ErrorCategory::Source => format!("Could not read the OKR spreadsheet: {}", self),
            ErrorCategory::Io => format!("File system error: {}", self),
            ErrorCategory::Serialization => format!("Could not encode/decode data: {}", self),
            ErrorCategory::Processing => format!("Dashboard processing failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, OkrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_critical() {
        let err = OkrError::MissingConfigError {
            field: "objectives".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("objectives"));
    }

    #[test]
    fn test_source_errors_are_recoverable() {
        let err = OkrError::SourceError {
            message: "sheet 'OKRs' not found".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains("sheet 'OKRs' not found"));
    }
}
