//! 組合 KR 紀錄、Objective 報告與整體摘要
//!
//! 純函式：輸入 KR 定義與一份列快照，輸出報告內容與診斷清單。

use crate::core::matcher::{MatchRules, NameMatcher};
use crate::core::normalizer::{format_delta, format_value, ValueNormalizer, PLACEHOLDER};
use crate::core::progress::{progress_pct, resolve_polarity};
use crate::core::status::{classify, kr_status, ATTENTION_MIN, ON_TRACK_MIN};
use crate::core::vocabulary::KrVocabulary;
use crate::domain::model::{
    DashboardSummary, DecisionAlert, Diagnostic, DiagnosticReason, KrDefinition, KrRecord,
    MatchConfidence, MatchResult, NormalizedValue, ObjectiveDefinition, ObjectiveReport,
    SpreadsheetRow, Status, Unit,
};

const MAX_ALERTS: usize = 3;

#[derive(Debug, Clone)]
pub struct AssembledDashboard {
    pub objectives: Vec<ObjectiveReport>,
    pub summary: DashboardSummary,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct DashboardAssembler<'a> {
    objectives: &'a [ObjectiveDefinition],
    rules: &'a MatchRules,
    vocabulary: &'a dyn KrVocabulary,
}

impl<'a> DashboardAssembler<'a> {
    pub fn new(
        objectives: &'a [ObjectiveDefinition],
        rules: &'a MatchRules,
        vocabulary: &'a dyn KrVocabulary,
    ) -> Self {
        Self {
            objectives,
            rules,
            vocabulary,
        }
    }

    /// `rows` 為 None 代表資料來源不可用，所有 KR 降級為無資料
    pub fn assemble(&self, rows: Option<&[SpreadsheetRow]>) -> AssembledDashboard {
        let rows = rows.unwrap_or(&[]);
        let matcher = NameMatcher::new(rows, self.rules);
        let mut diagnostics = Vec::new();

        let objectives: Vec<ObjectiveReport> = self
            .objectives
            .iter()
            .map(|objective| {
                let records = objective
                    .krs
                    .iter()
                    .map(|definition| {
                        let definition = with_group(definition, &objective.title);
                        let matched = matcher.find(&definition.name);
                        self.build_record(&definition, matched, &mut diagnostics)
                    })
                    .collect();
                build_objective_report(objective, records)
            })
            .collect();

        let summary = summarize(&objectives);
        AssembledDashboard {
            objectives,
            summary,
            diagnostics,
        }
    }

    pub fn build_record(
        &self,
        definition: &KrDefinition,
        matched: MatchResult<'_>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> KrRecord {
        let Some(row) = matched.row else {
            tracing::warn!("⚠️ No spreadsheet row for KR '{}'", definition.name);
            diagnostics.push(diagnostic(definition, DiagnosticReason::NoMatchingRow));
            return placeholder_record(definition);
        };

        tracing::debug!(
            "KR '{}' matched row '{}' ({:?})",
            definition.name,
            row.raw_name,
            matched.confidence
        );

        let normalizer = ValueNormalizer::new(self.vocabulary);
        let monthly: Vec<NormalizedValue> = row
            .monthly_values
            .iter()
            .map(|cell| normalizer.normalize(cell, &definition.name, definition.unit))
            .filter(|value| !value.is_empty())
            .collect();
        let target = normalizer.normalize(&row.meta_raw, &definition.name, definition.unit);

        let current = monthly.last().copied();
        let previous = monthly.len().checked_sub(2).map(|i| monthly[i]);

        if current.is_none() {
            tracing::warn!("⚠️ KR '{}' has no monthly values", definition.name);
            diagnostics.push(diagnostic(definition, DiagnosticReason::NoMonthlyValues));
        } else if target.is_empty() {
            tracing::warn!("⚠️ KR '{}' has no usable target", definition.name);
            diagnostics.push(diagnostic(definition, DiagnosticReason::MissingTarget));
        }

        let polarity = resolve_polarity(definition, &row.meta_raw, self.vocabulary);
        let progress = progress_pct(current.and_then(|c| c.number), target.number, polarity);
        let delta = match (current.and_then(|c| c.number), previous.and_then(|p| p.number)) {
            (Some(c), Some(p)) => Some(c - p),
            _ => None,
        };
        let unit = current.map(|c| c.unit).unwrap_or(target.unit);

        KrRecord {
            name: definition.name.clone(),
            objective: definition.group.clone(),
            current_display: display(current),
            previous_display: display(previous),
            target_display: format_value(&target),
            delta_display: format_delta(delta, unit),
            progress_pct: progress.unwrap_or(0),
            measured: progress.is_some(),
            status: kr_status(progress),
            chart_series: monthly.iter().filter_map(|v| v.number).collect(),
            matched_row: Some(row.raw_name.clone()),
            confidence: matched.confidence,
        }
    }
}

fn with_group(definition: &KrDefinition, title: &str) -> KrDefinition {
    let mut definition = definition.clone();
    if definition.group.is_none() {
        definition.group = Some(title.to_string());
    }
    definition
}

fn display(value: Option<NormalizedValue>) -> String {
    value
        .map(|v| format_value(&v))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn diagnostic(definition: &KrDefinition, reason: DiagnosticReason) -> Diagnostic {
    Diagnostic {
        kr_name: Some(definition.name.clone()),
        objective: definition.group.clone(),
        reason,
    }
}

pub fn placeholder_record(definition: &KrDefinition) -> KrRecord {
    KrRecord {
        name: definition.name.clone(),
        objective: definition.group.clone(),
        current_display: PLACEHOLDER.to_string(),
        previous_display: PLACEHOLDER.to_string(),
        target_display: PLACEHOLDER.to_string(),
        delta_display: format_delta(None, Unit::Generic),
        progress_pct: 0,
        measured: false,
        status: Status::NoData,
        chart_series: Vec::new(),
        matched_row: None,
        confidence: MatchConfidence::None,
    }
}

fn rounded_average(values: &[u8]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let total: u32 = values.iter().map(|v| *v as u32).sum();
    (total as f64 / values.len() as f64).round() as u8
}

pub fn build_objective_report(objective: &ObjectiveDefinition, krs: Vec<KrRecord>) -> ObjectiveReport {
    let measured: Vec<u8> = krs.iter().map(|k| k.progress_pct).filter(|p| *p > 0).collect();

    let mut alert_candidates: Vec<&KrRecord> = krs
        .iter()
        .filter(|k| k.progress_pct > 0 && k.progress_pct < ON_TRACK_MIN)
        .collect();
    alert_candidates.sort_by(|a, b| a.progress_pct.cmp(&b.progress_pct).then_with(|| a.name.cmp(&b.name)));
    let alerts = alert_candidates
        .into_iter()
        .take(MAX_ALERTS)
        .map(|k| DecisionAlert {
            kr_name: k.name.clone(),
            progress_pct: k.progress_pct,
            current_display: k.current_display.clone(),
            target_display: k.target_display.clone(),
        })
        .collect();

    ObjectiveReport {
        title: objective.title.clone(),
        subtitle: objective.subtitle.clone(),
        status: classify(krs.iter().map(|k| k.progress_pct)),
        avg_progress: rounded_average(&measured),
        on_track: measured.iter().filter(|p| **p >= ON_TRACK_MIN).count(),
        attention: measured
            .iter()
            .filter(|p| (ATTENTION_MIN..ON_TRACK_MIN).contains(*p))
            .count(),
        at_risk: measured.iter().filter(|p| **p < ATTENTION_MIN).count(),
        krs,
        alerts,
    }
}

pub fn summarize(objectives: &[ObjectiveReport]) -> DashboardSummary {
    let count = |status: Status| objectives.iter().filter(|o| o.status == status).count();
    let measured: Vec<u8> = objectives
        .iter()
        .flat_map(|o| o.krs.iter().map(|k| k.progress_pct))
        .filter(|p| *p > 0)
        .collect();

    DashboardSummary {
        total_krs: objectives.iter().map(|o| o.krs.len()).sum(),
        objectives_on_track: count(Status::OnTrack),
        objectives_attention: count(Status::Attention),
        objectives_at_risk: count(Status::AtRisk),
        objectives_no_data: count(Status::NoData),
        avg_progress: rounded_average(&measured),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vocabulary::KeywordVocabulary;
    use crate::domain::model::RawCell;

    fn vocabulary() -> KeywordVocabulary {
        KeywordVocabulary::new(&["taxa", "conversão"], &["chargeback", "tempo"])
    }

    fn row(name: &str, meta: RawCell, months: Vec<RawCell>) -> SpreadsheetRow {
        let mut monthly_values = months;
        monthly_values.resize(12, RawCell::Blank);
        SpreadsheetRow {
            id: None,
            raw_name: name.to_string(),
            meta_raw: meta,
            monthly_values,
        }
    }

    fn objective(title: &str, krs: &[&str]) -> ObjectiveDefinition {
        ObjectiveDefinition {
            title: title.to_string(),
            subtitle: None,
            krs: krs.iter().map(|k| KrDefinition::named(*k)).collect(),
        }
    }

    #[test]
    fn test_record_uses_latest_months() {
        let vocab = vocabulary();
        let rules = MatchRules::default();
        let objectives = [objective("CLIENTES", &["Taxa de chargeback"])];
        let rows = vec![row(
            "Taxa de chargeback",
            RawCell::text("≤ R$ 120K"),
            vec![RawCell::text("R$ 155K"), RawCell::Blank, RawCell::text("R$ 142K")],
        )];

        let dashboard = DashboardAssembler::new(&objectives, &rules, &vocab).assemble(Some(&rows));
        let kr = &dashboard.objectives[0].krs[0];

        assert_eq!(kr.current_display, "R$ 142.0K");
        assert_eq!(kr.previous_display, "R$ 155.0K");
        assert_eq!(kr.target_display, "R$ 120.0K");
        assert_eq!(kr.delta_display, "-R$ 13.0K");
        assert_eq!(kr.progress_pct, 85);
        assert_eq!(kr.status, Status::Attention);
        assert_eq!(kr.chart_series, vec![155_000.0, 142_000.0]);
        assert_eq!(kr.objective.as_deref(), Some("CLIENTES"));
        assert!(dashboard.diagnostics.is_empty());
    }

    #[test]
    fn test_true_zero_is_distinct_from_undefined_progress() {
        let vocab = vocabulary();
        let rules = MatchRules::default();
        let objectives = [objective("PESSOAS", &["Certificações concluídas", "Pontuação GPTW"])];
        let rows = vec![
            row("Certificações concluídas", RawCell::Int(20), vec![RawCell::Int(0)]),
            row("Pontuação GPTW", RawCell::Int(0), vec![RawCell::Int(80)]),
        ];

        let dashboard = DashboardAssembler::new(&objectives, &rules, &vocab).assemble(Some(&rows));
        let krs = &dashboard.objectives[0].krs;

        assert_eq!(krs[0].progress_pct, 0);
        assert!(krs[0].measured);
        assert_eq!(krs[1].progress_pct, 0);
        assert!(!krs[1].measured);
        assert!(krs.iter().all(|k| k.status == Status::NoData));
    }

    #[test]
    fn test_unavailable_source_degrades_every_kr() {
        let vocab = vocabulary();
        let rules = MatchRules::default();
        let objectives = [objective("CRESCIMENTO", &["Receita", "Receita Nacional (NB)"])];

        let dashboard = DashboardAssembler::new(&objectives, &rules, &vocab).assemble(None);

        assert!(dashboard.objectives[0]
            .krs
            .iter()
            .all(|k| k.progress_pct == 0 && k.status == Status::NoData));
        assert_eq!(dashboard.objectives[0].status, Status::NoData);
        assert_eq!(dashboard.summary.objectives_no_data, 1);
        assert_eq!(dashboard.diagnostics.len(), 2);
    }

    #[test]
    fn test_missing_target_is_reported() {
        let vocab = vocabulary();
        let rules = MatchRules::default();
        let objectives = [objective("CLIENTES", &["Indicador de branding"])];
        let rows = vec![row("Indicador de branding", RawCell::text("A definir"), vec![RawCell::Int(3)])];

        let dashboard = DashboardAssembler::new(&objectives, &rules, &vocab).assemble(Some(&rows));
        let kr = &dashboard.objectives[0].krs[0];

        assert_eq!(kr.current_display, "3");
        assert_eq!(kr.target_display, PLACEHOLDER);
        assert_eq!(kr.status, Status::NoData);
        assert_eq!(dashboard.diagnostics[0].reason, DiagnosticReason::MissingTarget);
    }

    #[test]
    fn test_objective_report_counts_and_alerts() {
        let objective = objective("CLIENTES", &[]);
        let make = |name: &str, pct: u8| {
            let mut record = placeholder_record(&KrDefinition::named(name));
            record.progress_pct = pct;
            record.status = kr_status(Some(pct));
            record
        };
        let krs = vec![
            make("NPS", 91),
            make("% Contas Não Ativadas", 67),
            make("MRR Churn Rate", 83),
            make("% atendimentos no SLA", 97),
            make("Taxa de chargeback", 85),
            make("CSAT", 96),
            make("Indicador de branding", 0),
            make("Nº solic./contas ativas", 78),
        ];

        let report = build_objective_report(&objective, krs);

        assert_eq!(report.status, Status::AtRisk);
        assert_eq!(report.avg_progress, 85);
        assert_eq!(report.on_track, 2);
        assert_eq!(report.attention, 4);
        assert_eq!(report.at_risk, 1);
        let alert_names: Vec<&str> = report.alerts.iter().map(|a| a.kr_name.as_str()).collect();
        assert_eq!(
            alert_names,
            vec!["% Contas Não Ativadas", "Nº solic./contas ativas", "MRR Churn Rate"]
        );

        let summary = summarize(std::slice::from_ref(&report));
        assert_eq!(summary.total_krs, 8);
        assert_eq!(summary.objectives_at_risk, 1);
        assert_eq!(summary.avg_progress, 85);
    }
}
