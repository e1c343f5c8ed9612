use crate::core::vocabulary::KrVocabulary;
use crate::domain::model::{KrDefinition, Polarity, RawCell};

const LOWER_BOUND_GLYPHS: [&str; 3] = ["≤", "<=", "<"];

/// 判斷 KR 的方向：設定中的明確值優先，其次是目標值前綴 "≤"，最後看名稱關鍵字
pub fn resolve_polarity(
    definition: &KrDefinition,
    target_raw: &RawCell,
    vocabulary: &dyn KrVocabulary,
) -> Polarity {
    if let Some(polarity) = definition.polarity {
        return polarity;
    }

    let bounded_above = matches!(
        target_raw,
        RawCell::Text(text) if LOWER_BOUND_GLYPHS.iter().any(|g| text.trim_start().starts_with(g))
    );

    if bounded_above || vocabulary.is_lower_better(&definition.name) {
        Polarity::LowerIsBetter
    } else {
        Polarity::HigherIsBetter
    }
}

/// 進度百分比 [0, 100]；缺少現值或目標、或目標為 0 時回傳 None（無資料）
pub fn progress_pct(current: Option<f64>, target: Option<f64>, polarity: Polarity) -> Option<u8> {
    let (current, target) = (current?, target?);
    if target == 0.0 || !current.is_finite() || !target.is_finite() {
        return None;
    }

    let ratio = match polarity {
        Polarity::HigherIsBetter => current / target,
        Polarity::LowerIsBetter => target / current,
    };

    // 現值為 0 且越低越好時 ratio 為 +inf，視為達標
    let clamped = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    Some((clamped * 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vocabulary::KeywordVocabulary;

    #[test]
    fn test_higher_is_better() {
        assert_eq!(progress_pct(Some(34.0), Some(35.0), Polarity::HigherIsBetter), Some(97));
        assert_eq!(progress_pct(Some(12.4e6), Some(12.0e6), Polarity::HigherIsBetter), Some(100));
        assert_eq!(progress_pct(Some(-3.0), Some(10.0), Polarity::HigherIsBetter), Some(0));
    }

    #[test]
    fn test_lower_is_better() {
        assert_eq!(progress_pct(Some(142_000.0), Some(120_000.0), Polarity::LowerIsBetter), Some(85));
        assert_eq!(progress_pct(Some(12.0), Some(10.0), Polarity::LowerIsBetter), Some(83));
        assert_eq!(progress_pct(Some(0.0), Some(10.0), Polarity::LowerIsBetter), Some(100));
    }

    #[test]
    fn test_missing_inputs_have_no_progress() {
        assert_eq!(progress_pct(None, Some(10.0), Polarity::HigherIsBetter), None);
        assert_eq!(progress_pct(Some(10.0), None, Polarity::HigherIsBetter), None);
        assert_eq!(progress_pct(Some(10.0), Some(0.0), Polarity::LowerIsBetter), None);
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let target = 80.0;
        let mut last = 0;
        for step in 0..400 {
            let current = step as f64 * 0.5;
            let pct = progress_pct(Some(current), Some(target), Polarity::HigherIsBetter).unwrap();
            assert!(pct >= last, "progress dropped at {}", current);
            assert!(pct <= 100);
            last = pct;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_resolve_polarity() {
        let vocab = KeywordVocabulary::new(&["taxa"], &["chargeback", "tempo"]);

        let chargeback = KrDefinition::named("Taxa de chargeback");
        assert_eq!(
            resolve_polarity(&chargeback, &RawCell::text("R$ 120K"), &vocab),
            Polarity::LowerIsBetter
        );

        let tickets = KrDefinition::named("Nº solic./contas ativas");
        assert_eq!(
            resolve_polarity(&tickets, &RawCell::text("≤ 0.25"), &vocab),
            Polarity::LowerIsBetter
        );

        let revenue = KrDefinition::named("Receita");
        assert_eq!(
            resolve_polarity(&revenue, &RawCell::text("R$ 12.0M"), &vocab),
            Polarity::HigherIsBetter
        );

        let mut forced = KrDefinition::named("Tempo de resposta");
        forced.polarity = Some(Polarity::HigherIsBetter);
        assert_eq!(
            resolve_polarity(&forced, &RawCell::text("≤ 10 dias"), &vocab),
            Polarity::HigherIsBetter
        );
    }
}
