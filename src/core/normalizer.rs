//! 儲存格數值正規化
//!
//! 將 "R$ 12.4M"、"67%"、"12 dias"、"4.3/5" 之類的格式化字串，
//! 或試算表中的純數字，轉成數值加上推斷出的單位。

use crate::core::vocabulary::KrVocabulary;
use crate::domain::model::{NormalizedValue, RawCell, Unit};
use once_cell::sync::Lazy;
use regex::Regex;

pub const PLACEHOLDER: &str = "—";

const BLANK_TOKENS: [&str; 3] = ["", "-", "—"];
const CURRENCY_MARKERS: [&str; 4] = ["R$", "US$", "€", "$"];
const COMPARISON_GLYPHS: [char; 6] = ['≤', '≥', '<', '>', '=', '+'];
const SCORE_SUFFIX: &str = "/5";

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)*").expect("valid number pattern"));
static BARE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:[.,]\d+)?$").expect("valid bare number pattern"));
// 前面不能是字母（"Média"），但可以緊接數字（"12dias"）；第一組保留給替換用
static DAY_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|[^\p{L}])dias?\b").expect("valid day word pattern"));

/// 空白判斷：未設定、NaN、空字串或佔位符號
pub fn is_blank(cell: &RawCell) -> bool {
    match cell {
        RawCell::Blank => true,
        RawCell::Float(f) => f.is_nan(),
        RawCell::Int(_) => false,
        RawCell::Text(s) => is_blank_text(s),
    }
}

fn is_blank_text(text: &str) -> bool {
    let trimmed = text.trim();
    BLANK_TOKENS.contains(&trimmed)
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("none")
}

fn infer_unit(text: &str) -> Unit {
    if CURRENCY_MARKERS.iter().any(|m| text.contains(m)) {
        Unit::Currency
    } else if text.contains('%') {
        Unit::Percent
    } else if DAY_WORD_RE.is_match(text) {
        Unit::Days
    } else if text.contains(SCORE_SUFFIX) {
        Unit::Score
    } else {
        Unit::Generic
    }
}

fn strip_decorations(text: &str) -> String {
    let mut cleaned = text.to_string();
    for marker in CURRENCY_MARKERS {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned = cleaned.replace(SCORE_SUFFIX, "").replace('%', "");
    cleaned.retain(|c| !COMPARISON_GLYPHS.contains(&c));
    DAY_WORD_RE.replace_all(&cleaned, "${1}").trim().to_string()
}

/// 解析數字字串。同時含有 "." 與 "," 時，"." 為千分位、"," 為小數點；
/// 同一種分隔符號出現多次視為千分位
pub fn parse_decimal(token: &str) -> Option<f64> {
    let dots = token.matches('.').count();
    let commas = token.matches(',').count();

    let canonical = if dots > 0 && commas > 0 {
        token.replace('.', "").replace(',', ".")
    } else if dots > 1 {
        token.replace('.', "")
    } else if commas > 1 {
        token.replace(',', "")
    } else {
        token.replace(',', ".")
    };

    canonical.parse::<f64>().ok()
}

fn scale_factor(rest: &str) -> f64 {
    let mut chars = rest.trim_start().chars();
    let factor = match chars.next() {
        Some('M') => 1_000_000.0,
        Some('K') | Some('k') => 1_000.0,
        _ => return 1.0,
    };
    // "12 meses" 之類的單字不算
    match chars.next() {
        Some(c) if c.is_alphabetic() => 1.0,
        _ => factor,
    }
}

/// 消除 12.4 * 1e6 之類運算的浮點誤差
fn tidy(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// 只看文字本身解析，不套用任何 KR 名稱的推斷
pub fn parse_text(text: &str) -> NormalizedValue {
    if is_blank_text(text) {
        return NormalizedValue::empty(Unit::Generic);
    }

    let trimmed = text.trim();
    let unit = infer_unit(trimmed);
    let cleaned = strip_decorations(trimmed);

    let Some(found) = NUMBER_RE.find(&cleaned) else {
        return NormalizedValue::empty(unit);
    };
    let Some(value) = parse_decimal(found.as_str()) else {
        return NormalizedValue::empty(unit);
    };

    let scaled = value * scale_factor(&cleaned[found.end()..]);
    NormalizedValue::new(tidy(scaled), unit)
}

pub struct ValueNormalizer<'a> {
    vocabulary: &'a dyn KrVocabulary,
}

impl<'a> ValueNormalizer<'a> {
    pub fn new(vocabulary: &'a dyn KrVocabulary) -> Self {
        Self { vocabulary }
    }

    /// 正規化單一儲存格。`kr_name` 用來判斷 0~1 之間的純數字是否為比例；
    /// `hint` 是 KR 設定中宣告的單位，只套用在沒有任何修飾的純數字
    pub fn normalize(&self, cell: &RawCell, kr_name: &str, hint: Option<Unit>) -> NormalizedValue {
        if is_blank(cell) {
            return NormalizedValue::empty(hint.unwrap_or(Unit::Generic));
        }

        match cell {
            RawCell::Int(i) => self.bare_number(*i as f64, kr_name, hint),
            RawCell::Float(f) => self.bare_number(*f, kr_name, hint),
            RawCell::Text(text) => {
                let trimmed = text.trim();
                if BARE_NUMBER_RE.is_match(trimmed) {
                    match parse_decimal(trimmed) {
                        Some(value) => self.bare_number(value, kr_name, hint),
                        None => NormalizedValue::empty(Unit::Generic),
                    }
                } else {
                    parse_text(trimmed)
                }
            }
            RawCell::Blank => NormalizedValue::empty(Unit::Generic),
        }
    }

    fn bare_number(&self, value: f64, kr_name: &str, hint: Option<Unit>) -> NormalizedValue {
        let percent_like = hint == Some(Unit::Percent) || self.vocabulary.is_percent_like(kr_name);
        if value > 0.0 && value < 1.0 && percent_like {
            return NormalizedValue::new(tidy(value * 100.0), Unit::Percent);
        }
        NormalizedValue::new(tidy(value), hint.unwrap_or(Unit::Generic))
    }
}

/// 去除小數尾端的 0，例如 "67.00" → "67"、"72.50" → "72.5"
pub fn trim_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value);
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    if abs >= 1_000_000.0 {
        format!("R$ {}{:.2}M", sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("R$ {}{:.1}K", sign, abs / 1_000.0)
    } else {
        format!("R$ {}{}", sign, trim_number(abs, 2))
    }
}

/// 顯示用格式化；無法呈現時回傳佔位符號，永不失敗
pub fn format_value(value: &NormalizedValue) -> String {
    let Some(n) = value.number.filter(|n| n.is_finite()) else {
        return PLACEHOLDER.to_string();
    };

    match value.unit {
        Unit::Currency => format_currency(n),
        Unit::Percent => format!("{}%", trim_number(n, 2)),
        Unit::Days => format!("{} dias", trim_number(n, 2)),
        Unit::Score => format!("{}{}", trim_number(n, 2), SCORE_SUFFIX),
        Unit::Generic => trim_number(n, 2),
    }
}

/// 與前期比較的差異，例如 "+R$ 1.20M"、"-1.5 p.p."、"+2.0 dias"
pub fn format_delta(delta: Option<f64>, unit: Unit) -> String {
    let Some(delta) = delta.filter(|d| d.is_finite()) else {
        return "n/d".to_string();
    };

    let sign = if delta >= 0.0 { "+" } else { "-" };
    let abs = delta.abs();

    match unit {
        Unit::Currency if abs >= 1_000_000.0 => format!("{}R$ {:.2}M", sign, abs / 1_000_000.0),
        Unit::Currency if abs >= 1_000.0 => format!("{}R$ {:.1}K", sign, abs / 1_000.0),
        Unit::Currency => format!("{}R$ {:.0}", sign, abs),
        Unit::Percent => format!("{}{:.1} p.p.", sign, abs),
        Unit::Days => format!("{}{:.1} dias", sign, abs),
        Unit::Score | Unit::Generic => format!("{}{:.2}", sign, abs),
    }
}
