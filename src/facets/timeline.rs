use std::collections::BTreeMap;

use tracing::debug;

use crate::state::data::{MediaRecord, MonthKey, TimelineEntry, YearBucket};

/// Group timestamps into calendar months.
///
/// Entries come back ascending by month key. Timestamps outside the
/// representable calendar range are skipped.
pub fn aggregate<I>(timestamps: I) -> Vec<TimelineEntry>
where
    I: IntoIterator<Item = i64>,
{
    let mut counts: BTreeMap<MonthKey, u64> = BTreeMap::new();
    for timestamp_ms in timestamps {
        match MonthKey::from_timestamp_ms(timestamp_ms) {
            Some(key) => *counts.entry(key).or_insert(0) += 1,
            None => debug!(timestamp_ms, "skipping timestamp outside calendar range"),
        }
    }

    // Labels are formatted once per month, not once per record
    counts
        .into_iter()
        .map(|(key, count)| TimelineEntry::new(key, count))
        .collect()
}

pub fn aggregate_records(records: &[MediaRecord]) -> Vec<TimelineEntry> {
    aggregate(records.iter().map(|r| r.timestamp_ms))
}

/// Bring store-provided entries into canonical form: ascending by key,
/// one entry per month, labels derived from the key.
pub fn normalize(entries: Vec<TimelineEntry>) -> Vec<TimelineEntry> {
    let mut counts: BTreeMap<MonthKey, u64> = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.month_key).or_insert(0) += entry.count;
    }
    counts
        .into_iter()
        .map(|(key, count)| TimelineEntry::new(key, count))
        .collect()
}

/// Group month entries by year. Expects canonical (ascending) input.
pub fn year_buckets(entries: &[TimelineEntry]) -> Vec<YearBucket> {
    let mut buckets: Vec<YearBucket> = Vec::new();
    for entry in entries {
        let year = entry.month_key.year();
        match buckets.last_mut() {
            Some(bucket) if bucket.year == year => {
                bucket.total += entry.count;
                bucket.months.push(entry.clone());
            }
            _ => buckets.push(YearBucket {
                year,
                months: vec![entry.clone()],
                total: entry.count,
            }),
        }
    }
    buckets
}

/// Largest monthly count, never less than 1 so histogram widths can
/// always divide by it.
pub fn max_count(entries: &[TimelineEntry]) -> u64 {
    entries.iter().map(|e| e.count).max().unwrap_or(0).max(1)
}

pub fn total_count(entries: &[TimelineEntry]) -> u64 {
    entries.iter().map(|e| e.count).sum()
}
