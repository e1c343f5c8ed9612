use crate::core::matcher::{MatchRules, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOKEN_OVERLAP_THRESHOLD};
use crate::core::rows::{ColumnMapping, MONTHS_PER_YEAR};
use crate::core::vocabulary::KeywordVocabulary;
use crate::domain::model::ObjectiveDefinition;
use crate::utils::error::{OkrError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_OUTPUT_FORMATS: [&str; 2] = ["json", "csv"];
pub const SUPPORTED_SOURCE_FORMATS: [&str; 3] = ["csv", "xlsx", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub dashboard: DashboardInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub objectives: Vec<ObjectiveDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_target_column")]
    pub target_column: String,
    #[serde(default = "default_month_columns")]
    pub month_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// KR 標籤 → 試算表中的標準名稱
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// 只允許完全比對的標籤（例如單純的「Receita」）
    #[serde(default)]
    pub exact_only: Vec<String>,
    #[serde(default = "default_token_overlap_threshold")]
    pub token_overlap_threshold: f64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_percent_keywords")]
    pub percent_keywords: Vec<String>,
    #[serde(default = "default_lower_is_better_keywords")]
    pub lower_is_better_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
}

fn default_sheet() -> String {
    "OKRs".to_string()
}

fn default_id_column() -> String {
    "ID".to_string()
}

fn default_name_column() -> String {
    "KR".to_string()
}

fn default_target_column() -> String {
    "Meta".to_string()
}

fn default_month_columns() -> Vec<String> {
    [
        "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto", "Setembro",
        "Outubro", "Novembro", "Dezembro",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_token_overlap_threshold() -> f64 {
    DEFAULT_TOKEN_OVERLAP_THRESHOLD
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_percent_keywords() -> Vec<String> {
    [
        "taxa", "percentual", "conversão", "engajamento", "SLA", "churn", "certificação",
        "ativação", "adesão", "retenção",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_lower_is_better_keywords() -> Vec<String> {
    [
        "falha", "falhas", "tempo", "ciclo", "churn", "chargeback", "não ativadas", "solic",
        "chamados",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_output_formats() -> Vec<String> {
    vec!["json".to_string()]
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            exact_only: Vec::new(),
            token_overlap_threshold: default_token_overlap_threshold(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            percent_keywords: default_percent_keywords(),
            lower_is_better_keywords: default_lower_is_better_keywords(),
        }
    }
}

impl DashboardConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(OkrError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| OkrError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OKR_SOURCE})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| OkrError::ProcessingError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性；沒有任何 KR 定義時屬於致命錯誤
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("dashboard.name", &self.dashboard.name)?;

        validation::validate_path("source.path", &self.source.path)?;
        if let Some(format) = &self.source.format {
            validation::validate_one_of(
                "source.format",
                &format.trim().to_ascii_lowercase(),
                &SUPPORTED_SOURCE_FORMATS,
            )?;
        }
        validation::validate_non_empty_string("source.sheet", &self.source.sheet)?;
        validation::validate_non_empty_string("source.name_column", &self.source.name_column)?;
        validation::validate_non_empty_string("source.target_column", &self.source.target_column)?;
        validation::validate_exact_len("source.month_columns", &self.source.month_columns, MONTHS_PER_YEAR)?;
        for month in &self.source.month_columns {
            validation::validate_non_empty_string("source.month_columns", month)?;
        }

        validation::validate_range(
            "matching.token_overlap_threshold",
            self.matching.token_overlap_threshold,
            0.0,
            1.0,
        )?;
        validation::validate_range(
            "matching.similarity_threshold",
            self.matching.similarity_threshold,
            0.0,
            1.0,
        )?;

        validation::validate_path("load.output_path", &self.load.output_path)?;
        for format in &self.load.output_formats {
            validation::validate_one_of("load.output_formats", format, &SUPPORTED_OUTPUT_FORMATS)?;
        }

        if self.objectives.is_empty() {
            return Err(OkrError::MissingConfigError {
                field: "objectives".to_string(),
            });
        }
        if self.total_krs() == 0 {
            return Err(OkrError::MissingConfigError {
                field: "objectives.krs".to_string(),
            });
        }
        for (index, objective) in self.objectives.iter().enumerate() {
            validation::validate_non_empty_string(&format!("objectives[{}].title", index), &objective.title)?;
            for kr in &objective.krs {
                validation::validate_non_empty_string(&format!("objectives[{}].krs.name", index), &kr.name)?;
            }
        }

        Ok(())
    }

    pub fn total_krs(&self) -> usize {
        self.objectives.iter().map(|o| o.krs.len()).sum()
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            id_column: self.source.id_column.clone(),
            name_column: self.source.name_column.clone(),
            target_column: self.source.target_column.clone(),
            month_columns: self.source.month_columns.clone(),
        }
    }

    pub fn match_rules(&self) -> MatchRules {
        MatchRules::new(&self.matching.aliases, &self.matching.exact_only).with_thresholds(
            self.matching.token_overlap_threshold,
            self.matching.similarity_threshold,
        )
    }

    pub fn vocabulary(&self) -> KeywordVocabulary {
        KeywordVocabulary::new(
            &self.classification.percent_keywords,
            &self.classification.lower_is_better_keywords,
        )
    }

    pub fn output_path(&self) -> &str {
        &self.load.output_path
    }

    pub fn source_path(&self) -> &str {
        &self.source.path
    }
}

impl Validate for DashboardConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[dashboard]
name = "OKRs PagBrasil"

[source]
path = "okrs.xlsx"

[matching]
exact_only = ["Receita"]
aliases = { "NPS" = "Net Promoter Score" }

[load]
output_path = "./output"
output_formats = ["json", "csv"]

[[objectives]]
title = "CRESCIMENTO"
subtitle = "Impulsionar o crescimento sustentável e rentável"

[[objectives.krs]]
name = "Receita"
unit = "currency"

[[objectives.krs]]
name = "Receita Nacional (NB)"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = DashboardConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.dashboard.name, "OKRs PagBrasil");
        assert_eq!(config.source.sheet, "OKRs");
        assert_eq!(config.source.month_columns.len(), 12);
        assert_eq!(config.total_krs(), 2);
        assert_eq!(config.objectives[0].krs[0].unit, Some(crate::domain::model::Unit::Currency));
        assert_eq!(config.matching.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        assert!(config.match_rules().is_exact_only("receita"));
        assert_eq!(config.match_rules().search_phrase("NPS"), "net promoter score");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_OKR_SOURCE", "/data/okrs-2026.xlsx");

        let toml_content = BASIC.replace("okrs.xlsx", "${TEST_OKR_SOURCE}");
        let config = DashboardConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.source.path, "/data/okrs-2026.xlsx");

        std::env::remove_var("TEST_OKR_SOURCE");
    }

    #[test]
    fn test_missing_krs_is_fatal() {
        let toml_content = r#"
[dashboard]
name = "empty"

[source]
path = "okrs.csv"

[load]
output_path = "./output"

[[objectives]]
title = "PESSOAS"
"#;
        let config = DashboardConfig::from_toml_str(toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, OkrError::MissingConfigError { .. }));
    }

    #[test]
    fn test_config_validation() {
        let mut config = DashboardConfig::from_toml_str(BASIC).unwrap();
        config.source.month_columns.pop();
        assert!(config.validate().is_err());

        let mut config = DashboardConfig::from_toml_str(BASIC).unwrap();
        config.load.output_formats = vec!["tsv".to_string()];
        assert!(config.validate().is_err());

        let mut config = DashboardConfig::from_toml_str(BASIC).unwrap();
        config.matching.token_overlap_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_format_is_case_insensitive() {
        let mut config = DashboardConfig::from_toml_str(BASIC).unwrap();
        config.source.format = Some("XLSX".to_string());
        assert!(config.validate_config().is_ok());

        config.source.format = Some("ods".to_string());
        assert!(config.validate_config().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = DashboardConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.objectives[0].title, "CRESCIMENTO");
    }
}
