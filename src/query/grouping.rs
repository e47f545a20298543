use std::collections::HashMap;

use tracing::debug;

use crate::state::data::{MediaRecord, MonthKey};

/// Heading of records whose timestamp has no calendar month
pub const UNDATED_LABEL: &str = "Undated";

/// Records of one calendar month, as displayed under a month heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGroup {
    /// `None` for the undated group
    pub month_key: Option<MonthKey>,
    /// Heading, e.g. "March 2024"
    pub label: String,
    pub records: Vec<MediaRecord>,
}

/// Partition sorted results by month.
///
/// Order within a group is the store's order, and groups appear in the
/// order of their first member, so the dominant sort decides group order.
/// Every record lands in exactly one group; timestamps outside the
/// calendar go to a single undated group.
pub fn group_by_month(records: &[MediaRecord]) -> Vec<MonthGroup> {
    let mut groups: Vec<MonthGroup> = Vec::new();
    let mut index: HashMap<Option<MonthKey>, usize> = HashMap::new();

    for record in records {
        let month_key = record.month_key();
        if month_key.is_none() {
            debug!(
                media_id = record.id,
                timestamp_ms = record.timestamp_ms,
                "media timestamp has no calendar month"
            );
        }
        let slot = *index.entry(month_key).or_insert_with(|| {
            groups.push(MonthGroup {
                month_key,
                label: month_key
                    .map_or_else(|| UNDATED_LABEL.to_string(), |key| key.long_label()),
                records: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].records.push(record.clone());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::FileType;
    use chrono::{TimeZone, Utc};

    fn record(id: i64, sender_name: &str, (year, month, day): (i32, u32, u32)) -> MediaRecord {
        MediaRecord {
            id,
            conversation_id: 1,
            sender_id: id,
            timestamp_ms: Utc
                .with_ymd_and_hms(year, month, day, 9, 30, 0)
                .unwrap()
                .timestamp_millis(),
            file_type: FileType::Image,
            locator: format!("photos/{id}.jpg"),
            sender_name: sender_name.to_string(),
            conversation_name: "Family".to_string(),
        }
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        // Sorted by sender, so months interleave
        let records = vec![
            record(1, "Adam", (2024, 4, 2)),
            record(2, "Adam", (2024, 3, 9)),
            record(3, "Bea", (2024, 4, 20)),
            record(4, "Bea", (2023, 12, 1)),
        ];
        let groups = group_by_month(&records);

        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["April 2024", "March 2024", "December 2023"]);
        let april: Vec<i64> = groups[0].records.iter().map(|r| r.id).collect();
        assert_eq!(april, vec![1, 3]);
    }

    #[test]
    fn test_every_record_is_grouped() {
        let mut far = record(2, "Adam", (2024, 1, 1));
        // 10000-01-01T00:00:00Z
        far.timestamp_ms = 253_402_300_800_000;
        let mut lost = record(3, "Bea", (2024, 1, 1));
        lost.timestamp_ms = i64::MAX;
        let records = vec![record(1, "Adam", (2024, 1, 5)), far, lost];

        let groups = group_by_month(&records);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["January 2024", "January 10000", UNDATED_LABEL]);
        assert_eq!(groups[2].month_key, None);
        let grouped: usize = groups.iter().map(|g| g.records.len()).sum();
        assert_eq!(grouped, records.len());
    }

    #[test]
    fn test_no_records_no_groups() {
        assert!(group_by_month(&[]).is_empty());
    }
}
