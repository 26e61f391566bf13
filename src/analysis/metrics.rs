// src/analysis/metrics.rs
use crate::domain::models::{Bar, WindowStats};
use chrono::Weekday;
use rust_decimal::Decimal;
use serde::Serialize;

const BUSINESS_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

/// Next trading day in a Mon..Fri week; `None` for weekend labels.
fn next_business_day(day: Weekday) -> Option<Weekday> {
    let pos = BUSINESS_DAYS.iter().position(|d| *d == day)?;
    Some(BUSINESS_DAYS[(pos + 1) % BUSINESS_DAYS.len()])
}

/// Index of the most recent `target` in `days`.
///
/// When `target` never occurs (it was a holiday), the most recent adjacent
/// pair whose gap skips exactly `target` as the immediate successor marks
/// where it belongs, and the index after the earlier day is returned. Only
/// the first missing day of a gap is recognised.
///
/// The successor of Friday is Monday, so a Monday holiday is found across
/// the weekend: `[Thu, Fri, Tue]` with target `Mon` gives `Some(2)`.
/// Weekend labels have no successor and never mark a gap.
pub fn weekday_index(days: &[Weekday], target: Weekday) -> Option<usize> {
    if let Some(ix) = days.iter().rposition(|d| *d == target) {
        return Some(ix);
    }

    days.windows(2)
        .enumerate()
        .rev()
        .find_map(|(i, pair)| {
            let expected = next_business_day(pair[0])?;
            (pair[1] != expected && expected == target).then_some(i + 1)
        })
}

/// Day-over-day figures reported alongside the live window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub last_week_overnight_pct: Option<Decimal>,
    pub today_overnight_pct: Option<Decimal>,
    pub last_week_vwap_ret: Option<Decimal>,
    pub hist_vwap: Option<Decimal>,
}

fn ratio(numerator: Option<Decimal>, denominator: Option<Decimal>) -> Option<Decimal> {
    numerator?.checked_div(denominator?)
}

/// Volume-weighted mean of the bars' average prices
pub fn historical_vwap(bars: &[Bar]) -> Option<Decimal> {
    let (weighted, volume) = bars.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(weighted, volume), bar| (weighted + bar.average * bar.volume, volume + bar.volume),
    );
    weighted.checked_div(volume)
}

/// Compare the same weekday a week ago, today's open and the stored history.
///
/// `bars` must be in date order. Missing inputs (no bars, no live open,
/// zero divisors) produce `None` for the affected figure.
pub fn compute_metrics(bars: &[Bar], live: Option<&WindowStats>, today: Weekday) -> Metrics {
    let days: Vec<Weekday> = bars.iter().map(|b| b.day_of_week).collect();

    let (overnight, vwap_ret) = match weekday_index(&days, today) {
        Some(ix) if ix >= 1 => {
            let (prev, day) = (&bars[ix - 1], &bars[ix]);
            (
                ratio(Some(day.open), Some(prev.close)),
                ratio(Some(day.average), Some(prev.average)),
            )
        }
        _ => (None, None),
    };

    let today_overnight = ratio(live.and_then(|w| w.open), bars.last().map(|b| b.close));

    let round = |v: Option<Decimal>| v.map(|d| d.round_dp(2));
    Metrics {
        last_week_overnight_pct: round(overnight),
        today_overnight_pct: round(today_overnight),
        last_week_vwap_ret: round(vwap_ret),
        hist_vwap: round(historical_vwap(bars)),
    }
}
