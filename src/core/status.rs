use crate::domain::model::Status;

pub const ON_TRACK_MIN: u8 = 95;
pub const ATTENTION_MIN: u8 = 70;

/// KR 與 Objective 共用的狀態分類。pct == 0 視為尚未量測而忽略
pub fn classify<I>(percentages: I) -> Status
where
    I: IntoIterator<Item = u8>,
{
    let measured: Vec<u8> = percentages.into_iter().filter(|p| *p > 0).collect();

    if measured.is_empty() {
        Status::NoData
    } else if measured.iter().any(|p| *p < ATTENTION_MIN) {
        Status::AtRisk
    } else if measured.iter().any(|p| *p < ON_TRACK_MIN) {
        Status::Attention
    } else {
        Status::OnTrack
    }
}

pub fn kr_status(progress: Option<u8>) -> Status {
    classify(progress)
}
