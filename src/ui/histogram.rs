/// Timeline histogram
/// Computes bar lengths for the month-by-month media histogram
use crate::facets::timeline;
use crate::state::data::{MonthKey, TimelineEntry};

/// One histogram bar
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBar {
    pub month_key: MonthKey,
    pub label: String,
    pub count: u64,
    /// Bar length relative to the busiest month, 0.0..=1.0
    pub fraction: f32,
    pub selected: bool,
}

/// Histogram data structure
#[derive(Debug, Clone, Default)]
pub struct TimelineHistogram {
    /// Bars in chronological order
    pub bars: Vec<HistogramBar>,
    pub max_count: u64,
}

impl TimelineHistogram {
    pub fn new(entries: &[TimelineEntry], selected: Option<MonthKey>) -> Self {
        // Normalize against the busiest month (at least 1)
        let max_count = timeline::max_count(entries);
        let max_value = max_count as f32;

        let bars = entries
            .iter()
            .map(|entry| HistogramBar {
                month_key: entry.month_key,
                label: entry.label.clone(),
                count: entry.count,
                fraction: entry.count as f32 / max_value,
                selected: selected == Some(entry.month_key),
            })
            .collect();

        Self { bars, max_count }
    }

    /// Bars most recent first, the order the sidebar lists them in
    pub fn newest_first(&self) -> impl Iterator<Item = &HistogramBar> {
        self.bars.iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, count: u64) -> TimelineEntry {
        TimelineEntry::new(key.parse().unwrap(), count)
    }

    #[test]
    fn test_fractions_relative_to_busiest_month() {
        let entries = vec![entry("2024-01", 2), entry("2024-02", 8), entry("2024-03", 4)];
        let histogram = TimelineHistogram::new(&entries, "2024-03".parse().ok());

        let fractions: Vec<f32> = histogram.bars.iter().map(|b| b.fraction).collect();
        assert_eq!(fractions, vec![0.25, 1.0, 0.5]);
        assert_eq!(histogram.max_count, 8);
        assert!(histogram.bars[2].selected);
        assert!(!histogram.bars[0].selected);
        assert_eq!(histogram.newest_first().next().map(|b| b.label.as_str()), Some("Mar 2024"));
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = TimelineHistogram::new(&[], None);
        assert!(histogram.bars.is_empty());
        assert_eq!(histogram.max_count, 1);
    }
}
