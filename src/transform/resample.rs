// src/transform/resample.rs

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// Business-day bin of `d`: weekends fall into the preceding Friday.
pub fn business_day(d: NaiveDate) -> NaiveDate {
    match d.weekday() {
        Weekday::Sat => d - Duration::days(1),
        Weekday::Sun => d - Duration::days(2),
        _ => d,
    }
}

/// Resample dated multi-series observations onto business days.
///
/// Each output cell is the mean of the present observations of that series
/// in the bin. A series with nothing in a bin stays `None`; no forward
/// filling happens. Bins where every series is absent are dropped, so days
/// without observations never appear. Output is ascending by date.
pub fn resample_business_mean(
    width: usize,
    points: impl IntoIterator<Item = (NaiveDate, Vec<Option<f64>>)>,
) -> Vec<(NaiveDate, Vec<Option<f64>>)> {
    let mut bins: BTreeMap<NaiveDate, Vec<(f64, u32)>> = BTreeMap::new();
    for (date, values) in points {
        let acc = bins
            .entry(business_day(date))
            .or_insert_with(|| vec![(0.0, 0); width]);
        for (slot, v) in acc.iter_mut().zip(values) {
            if let Some(v) = v {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    bins.into_iter()
        .filter_map(|(date, acc)| {
            let means: Vec<Option<f64>> = acc
                .into_iter()
                .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
                .collect();
            means.iter().any(Option::is_some).then_some((date, means))
        })
        .collect()
}
