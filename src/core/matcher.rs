//! KR 名稱 ↔ 試算表列的比對
//!
//! 依序嘗試：正規化後完全相等 → 子字串包含 → 單字重疊加相似度。
//! 每一階段有唯一結果就停止；列在建立時先排序，結果不受輸入順序影響。

use crate::domain::model::{MatchConfidence, MatchResult, SpreadsheetRow};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const DEFAULT_TOKEN_OVERLAP_THRESHOLD: f64 = 0.34;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.55;

/// 小寫、去除重音、非英數字元串合併成單一空白
pub fn normalize_label(label: &str) -> String {
    let folded: String = label
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(normalized: &str) -> BTreeSet<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

/// 別名表、僅限完全比對的標籤，以及模糊比對門檻
#[derive(Debug, Clone)]
pub struct MatchRules {
    aliases: HashMap<String, String>,
    exact_only: HashSet<String>,
    token_overlap_threshold: f64,
    similarity_threshold: f64,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
            exact_only: HashSet::new(),
            token_overlap_threshold: DEFAULT_TOKEN_OVERLAP_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl MatchRules {
    pub fn new<'s>(
        aliases: impl IntoIterator<Item = (&'s String, &'s String)>,
        exact_only: impl IntoIterator<Item = &'s String>,
    ) -> Self {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(label, phrase)| (normalize_label(label), normalize_label(phrase)))
                .collect(),
            exact_only: exact_only.into_iter().map(|l| normalize_label(l)).collect(),
            ..Self::default()
        }
    }

    pub fn with_thresholds(mut self, token_overlap: f64, similarity: f64) -> Self {
        self.token_overlap_threshold = token_overlap;
        self.similarity_threshold = similarity;
        self
    }

    pub fn search_phrase(&self, label: &str) -> String {
        let normalized = normalize_label(label);
        self.aliases.get(&normalized).cloned().unwrap_or(normalized)
    }

    pub fn is_exact_only(&self, label: &str) -> bool {
        self.exact_only.contains(&normalize_label(label))
    }
}

struct IndexedRow<'a> {
    row: &'a SpreadsheetRow,
    normalized: String,
    tokens: BTreeSet<String>,
}

struct FuzzyScore {
    overlap: f64,
    overlap_count: usize,
    similarity: f64,
    length_gap: usize,
}

impl FuzzyScore {
    fn rank(&self, other: &FuzzyScore) -> Ordering {
        self.overlap
            .total_cmp(&other.overlap)
            .then(self.overlap_count.cmp(&other.overlap_count))
            .then(self.similarity.total_cmp(&other.similarity))
            .then(other.length_gap.cmp(&self.length_gap))
    }
}

/// 針對單一快照建立的比對器，只借用列資料
pub struct NameMatcher<'a> {
    rows: Vec<IndexedRow<'a>>,
    rules: &'a MatchRules,
}

impl<'a> NameMatcher<'a> {
    pub fn new(rows: &'a [SpreadsheetRow], rules: &'a MatchRules) -> Self {
        let mut indexed: Vec<IndexedRow<'a>> = rows
            .iter()
            .map(|row| {
                let normalized = normalize_label(&row.raw_name);
                let tokens = tokenize(&normalized);
                IndexedRow {
                    row,
                    normalized,
                    tokens,
                }
            })
            .filter(|r| !r.normalized.is_empty())
            .collect();

        indexed.sort_by(|a, b| {
            a.normalized
                .cmp(&b.normalized)
                .then_with(|| a.row.raw_name.cmp(&b.row.raw_name))
                .then_with(|| a.row.id.cmp(&b.row.id))
        });

        Self {
            rows: indexed,
            rules,
        }
    }

    pub fn find(&self, label: &str) -> MatchResult<'a> {
        let phrase = self.rules.search_phrase(label);
        if phrase.is_empty() {
            return MatchResult::none();
        }

        if let Some(row) = self.exact(&phrase) {
            return MatchResult::found(row, MatchConfidence::Exact);
        }

        if self.rules.is_exact_only(label) {
            tracing::debug!("'{}' is exact-only and has no exact row", label);
            return MatchResult::none();
        }

        if let Some(row) = self.substring(&phrase) {
            return MatchResult::found(row, MatchConfidence::Substring);
        }

        match self.fuzzy(&phrase) {
            Some(row) => MatchResult::found(row, MatchConfidence::Fuzzy),
            None => MatchResult::none(),
        }
    }

    fn exact(&self, phrase: &str) -> Option<&'a SpreadsheetRow> {
        self.rows
            .iter()
            .find(|r| r.normalized == phrase)
            .map(|r| r.row)
    }

    /// 多個候選時取正規化名稱最短者（最具體）
    fn substring(&self, phrase: &str) -> Option<&'a SpreadsheetRow> {
        self.rows
            .iter()
            .filter(|r| r.normalized.contains(phrase))
            .min_by_key(|r| r.normalized.chars().count())
            .map(|r| r.row)
    }

    fn fuzzy(&self, phrase: &str) -> Option<&'a SpreadsheetRow> {
        let phrase_tokens = tokenize(phrase);
        if phrase_tokens.is_empty() {
            return None;
        }
        let phrase_len = phrase.chars().count();

        let mut best: Option<(FuzzyScore, &IndexedRow<'a>)> = None;
        for candidate in &self.rows {
            let overlap_count = phrase_tokens
                .iter()
                .filter(|t| candidate.tokens.contains(*t))
                .count();
            let score = FuzzyScore {
                overlap: overlap_count as f64 / phrase_tokens.len() as f64,
                overlap_count,
                similarity: strsim::normalized_levenshtein(phrase, &candidate.normalized),
                length_gap: phrase_len.abs_diff(candidate.normalized.chars().count()),
            };

            // 同分時保留先出現（排序較前）的列
            let better = match &best {
                Some((current, _)) => score.rank(current) == Ordering::Greater,
                None => true,
            };
            if better {
                best = Some((score, candidate));
            }
        }

        let (score, candidate) = best?;
        if score.overlap >= self.rules.token_overlap_threshold
            || score.similarity >= self.rules.similarity_threshold
        {
            tracing::debug!(
                "fuzzy match '{}' -> '{}' (overlap {:.2}, similarity {:.2})",
                phrase,
                candidate.row.raw_name,
                score.overlap,
                score.similarity
            );
            Some(candidate.row)
        } else {
            None
        }
    }
}
