//! Aggregate statistics for the dashboard

use indexmap::IndexMap;
use inkfeed_common::records::distinct_classes;
use inkfeed_common::Record;

/// Dashboard figures
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSummary {
    pub total: usize,
    /// Records whose timestamp starts with today's date
    pub today_count: usize,
    pub ai_count: usize,
    /// Percentage of AI-generated comments, one decimal
    pub ai_usage_percent: f64,
    /// Class with the most records and its count; the first class seen wins ties
    pub most_active_class: Option<(String, usize)>,
    /// Mean `comment_length` over AI records, one decimal; 0 without any
    pub avg_ai_comment_length: f64,
    /// Sorted distinct non-empty class names
    pub classes: Vec<String>,
}

impl StatsSummary {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Compute dashboard figures; `today` is a `YYYY-MM-DD` date
pub fn compute_stats(records: &[Record], today: &str) -> StatsSummary {
    let total = records.len();
    let today_count = records
        .iter()
        .filter(|r| r.date() == today)
        .count();

    let ai_lengths: Vec<usize> = records
        .iter()
        .filter(|r| r.ai_generated)
        .map(|r| r.comment_length)
        .collect();
    let ai_count = ai_lengths.len();

    let ai_usage_percent = if total == 0 {
        0.0
    } else {
        round1(ai_count as f64 / total as f64 * 100.0)
    };

    let avg_ai_comment_length = if ai_count == 0 {
        0.0
    } else {
        round1(ai_lengths.iter().sum::<usize>() as f64 / ai_count as f64)
    };

    StatsSummary {
        total,
        today_count,
        ai_count,
        ai_usage_percent,
        most_active_class: most_active_class(records),
        avg_ai_comment_length,
        classes: distinct_classes(records),
    }
}

fn most_active_class(records: &[Record]) -> Option<(String, usize)> {
    let mut tally: IndexMap<&str, usize> = IndexMap::new();
    for record in records {
        *tally.entry(record.class_name.as_str()).or_insert(0) += 1;
    }

    // Strictly greater keeps the earliest class on ties
    let mut best: Option<(&str, usize)> = None;
    for (class_name, count) in tally {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((class_name, count));
        }
    }
    best.map(|(class_name, count)| (class_name.to_string(), count))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
