use crate::core::matcher::normalize_label;

/// KR 名稱分類器：百分比判斷與「越低越好」判斷都透過這個介面，
/// 詞彙錯誤時只需替換實作，不需修改解析器
pub trait KrVocabulary: Send + Sync {
    fn is_percent_like(&self, kr_name: &str) -> bool;
    fn is_lower_better(&self, kr_name: &str) -> bool;
}

/// 以關鍵字清單判斷，關鍵字需對齊 KR 名稱中的單字開頭
#[derive(Debug, Clone, Default)]
pub struct KeywordVocabulary {
    percent_keywords: Vec<String>,
    lower_is_better_keywords: Vec<String>,
}

impl KeywordVocabulary {
    pub fn new<S: AsRef<str>>(percent_keywords: &[S], lower_is_better_keywords: &[S]) -> Self {
        Self {
            percent_keywords: normalize_keywords(percent_keywords),
            lower_is_better_keywords: normalize_keywords(lower_is_better_keywords),
        }
    }

    fn matches_any(keywords: &[String], kr_name: &str) -> bool {
        let padded = format!(" {} ", normalize_label(kr_name));
        keywords
            .iter()
            .any(|keyword| padded.contains(&format!(" {}", keyword)))
    }
}

fn normalize_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = keywords
        .iter()
        .map(|k| normalize_label(k.as_ref()))
        .filter(|k| !k.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

impl KrVocabulary for KeywordVocabulary {
    fn is_percent_like(&self, kr_name: &str) -> bool {
        kr_name.contains('%') || Self::matches_any(&self.percent_keywords, kr_name)
    }

    fn is_lower_better(&self, kr_name: &str) -> bool {
        Self::matches_any(&self.lower_is_better_keywords, kr_name)
    }
}
