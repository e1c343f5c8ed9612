use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 試算表儲存格的原始值（字串、整數、浮點數或空白）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawCell {
    Blank,
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawCell {
    pub fn text(value: impl Into<String>) -> Self {
        RawCell::Text(value.into())
    }

    /// 以字串形式呈現儲存格內容（空白回傳 None）
    pub fn as_label(&self) -> Option<String> {
        match self {
            RawCell::Blank => None,
            RawCell::Int(i) => Some(i.to_string()),
            RawCell::Float(f) if f.is_nan() => None,
            RawCell::Float(f) => Some(f.to_string()),
            RawCell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

impl From<&serde_json::Value> for RawCell {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawCell::Blank,
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawCell::Int(i),
                None => n.as_f64().map(RawCell::Float).unwrap_or(RawCell::Blank),
            },
            serde_json::Value::String(s) => RawCell::Text(s.clone()),
            serde_json::Value::Bool(b) => RawCell::Text(b.to_string()),
            other => RawCell::Text(other.to_string()),
        }
    }
}

/// 資料來源的一列：欄位名稱 → 原始值
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceRecord {
    pub data: HashMap<String, RawCell>,
}

impl SourceRecord {
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, RawCell)>) -> Self {
        Self {
            data: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// 單次載入時的資料快照；來源無法讀取時以 Unavailable 表示
#[derive(Debug, Clone)]
pub enum RowSnapshot {
    Loaded(Vec<SourceRecord>),
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Currency,
    Percent,
    Days,
    Score,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedValue {
    pub number: Option<f64>,
    pub unit: Unit,
}

impl NormalizedValue {
    pub fn new(number: f64, unit: Unit) -> Self {
        Self {
            number: Some(number),
            unit,
        }
    }

    pub fn empty(unit: Unit) -> Self {
        Self { number: None, unit }
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KrDefinition {
    pub name: String,
    /// 所屬 Objective 標題，載入設定時填入
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub polarity: Option<Polarity>,
}

impl KrDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            unit: None,
            polarity: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveDefinition {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub krs: Vec<KrDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadsheetRow {
    pub id: Option<String>,
    pub raw_name: String,
    pub meta_raw: RawCell,
    /// 一月到十二月，固定 12 格
    pub monthly_values: Vec<RawCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchConfidence {
    Exact,
    Substring,
    Fuzzy,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
    pub row: Option<&'a SpreadsheetRow>,
    pub confidence: MatchConfidence,
}

impl<'a> MatchResult<'a> {
    pub fn none() -> Self {
        Self {
            row: None,
            confidence: MatchConfidence::None,
        }
    }

    pub fn found(row: &'a SpreadsheetRow, confidence: MatchConfidence) -> Self {
        Self {
            row: Some(row),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    OnTrack,
    Attention,
    AtRisk,
    NoData,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::OnTrack => "on track",
            Status::Attention => "attention",
            Status::AtRisk => "at risk",
            Status::NoData => "no data",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KrRecord {
    pub name: String,
    pub objective: Option<String>,
    pub current_display: String,
    pub previous_display: String,
    pub target_display: String,
    pub delta_display: String,
    pub progress_pct: u8,
    /// false 表示進度無法計算（缺值或目標為 0），與真正的 0% 區分
    pub measured: bool,
    pub status: Status,
    pub chart_series: Vec<f64>,
    pub matched_row: Option<String>,
    pub confidence: MatchConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticReason {
    NoMatchingRow,
    NoMonthlyValues,
    MissingTarget,
    SourceUnavailable { message: String },
}

/// 給維運人員檢視的診斷訊息，不會呈現給一般使用者
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kr_name: Option<String>,
    pub objective: Option<String>,
    pub reason: DiagnosticReason,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = self.kr_name.as_deref().unwrap_or("<dashboard>");
        match &self.reason {
            DiagnosticReason::NoMatchingRow => {
                write!(f, "{}: no spreadsheet row matches this KR", subject)
            }
            DiagnosticReason::NoMonthlyValues => {
                write!(f, "{}: matched row has no monthly values", subject)
            }
            DiagnosticReason::MissingTarget => {
                write!(f, "{}: matched row has no usable target", subject)
            }
            DiagnosticReason::SourceUnavailable { message } => {
                write!(f, "{}: data source unavailable ({})", subject, message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionAlert {
    pub kr_name: String,
    pub progress_pct: u8,
    pub current_display: String,
    pub target_display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectiveReport {
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Status,
    pub avg_progress: u8,
    pub on_track: usize,
    pub attention: usize,
    pub at_risk: usize,
    pub krs: Vec<KrRecord>,
    pub alerts: Vec<DecisionAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_krs: usize,
    pub objectives_on_track: usize,
    pub objectives_attention: usize,
    pub objectives_at_risk: usize,
    pub objectives_no_data: usize,
    pub avg_progress: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub source_available: bool,
    pub summary: DashboardSummary,
    pub objectives: Vec<ObjectiveReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DashboardReport {
    pub fn kr_records(&self) -> impl Iterator<Item = &KrRecord> {
        self.objectives.iter().flat_map(|o| o.krs.iter())
    }
}
