//! Aggregations feeding the dashboard charts.
//!
//! All functions are pure and total, including over an empty slice.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::models::{Record, Scores};

// ---

/// Label frequencies in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts {
    entries: Vec<(String, usize)>,
}

impl LabelCounts {
    // ---
    pub fn get(&self, label: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One bucket per distinct emotion.
pub fn emotion_counts(records: &[Record]) -> LabelCounts {
    count_by(records, |r| &r.emotion)
}

/// One bucket per distinct tendency string (case preserved).
pub fn tendency_counts(records: &[Record]) -> LabelCounts {
    count_by(records, |r| &r.tendency)
}

/// Per-day mean of each score axis, keyed by UTC calendar date.
///
/// Means are rounded to two decimals. Dates iterate in ascending order.
pub fn daily_average_scores(records: &[Record]) -> BTreeMap<NaiveDate, Scores> {
    // ---
    let mut sums: BTreeMap<NaiveDate, (Scores, usize)> = BTreeMap::new();

    for record in records {
        let day = record.created_at.date_naive();
        let (sum, count) = sums.entry(day).or_default();
        sum.tdah += record.scores.tdah;
        sum.ansiedade += record.scores.ansiedade;
        sum.depressao += record.scores.depressao;
        *count += 1;
    }

    sums.into_iter()
        .map(|(day, (sum, count))| {
            let n = count as f64;
            let avg = Scores {
                tdah: round2(sum.tdah / n),
                ansiedade: round2(sum.ansiedade / n),
                depressao: round2(sum.depressao / n),
            };
            (day, avg)
        })
        .collect()
}

fn count_by<F>(records: &[Record], label: F) -> LabelCounts
where
    F: Fn(&Record) -> &String,
{
    // ---
    let mut entries: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let key = label(record);
        match index.get(key.as_str()) {
            Some(&slot) => entries[slot].1 += 1,
            None => {
                index.insert(key.as_str(), entries.len());
                entries.push((key.clone(), 1));
            }
        }
    }

    LabelCounts { entries }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{RecordId, DEFAULT_TENDENCY};
    use chrono::{TimeZone, Utc};

    fn create_test_record(day: u32, hour: u32, emotion: &str, scores: Scores) -> Record {
        // ---
        Record {
            id: RecordId::Number(i64::from(day * 100 + hour)),
            student_id: Some("1".to_string()),
            student_name: None,
            text: String::new(),
            answers: Default::default(),
            emotion: emotion.to_string(),
            tendency: DEFAULT_TENDENCY.to_string(),
            scores,
            created_at: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
        }
    }

    fn depression(value: f64) -> Scores {
        Scores {
            depressao: value,
            ..Scores::default()
        }
    }

    #[test]
    fn test_empty_views() {
        // ---
        assert!(emotion_counts(&[]).is_empty());
        assert!(tendency_counts(&[]).is_empty());
        assert!(daily_average_scores(&[]).is_empty());
    }

    #[test]
    fn test_emotion_counts_keep_first_appearance_order() {
        // ---
        let records = vec![
            create_test_record(1, 9, "triste", Scores::default()),
            create_test_record(1, 10, "feliz", Scores::default()),
            create_test_record(2, 9, "triste", Scores::default()),
        ];
        let counts = emotion_counts(&records);

        let labels: Vec<(&str, usize)> = counts.iter().collect();
        assert_eq!(labels, vec![("triste", 2), ("feliz", 1)]);
        assert_eq!(counts.get("feliz"), Some(1));
        assert_eq!(counts.get("irritado"), None);
    }

    #[test]
    fn test_tendency_counts_are_case_sensitive() {
        // ---
        let mut a = create_test_record(1, 9, "neutra", Scores::default());
        a.tendency = "Tendência a TDAH".to_string();
        let mut b = a.clone();
        b.tendency = "tendência a tdah".to_string();

        assert_eq!(tendency_counts(&[a, b]).len(), 2);
    }

    #[test]
    fn test_daily_average_is_a_mean() {
        // ---
        let records = vec![
            create_test_record(1, 9, "neutra", depression(2.0)),
            create_test_record(1, 15, "neutra", depression(4.0)),
        ];
        let daily = daily_average_scores(&records);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[&day].depressao, 3.0);
        assert_eq!(daily[&day].tdah, 0.0);
    }

    #[test]
    fn test_daily_average_rounds_to_two_decimals() {
        // ---
        let records = vec![
            create_test_record(1, 9, "neutra", depression(1.0)),
            create_test_record(1, 10, "neutra", depression(1.0)),
            create_test_record(1, 11, "neutra", depression(2.0)),
        ];
        let daily = daily_average_scores(&records);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert_eq!(daily[&day].depressao, 1.33);
    }

    #[test]
    fn test_dates_ascend() {
        // ---
        let records = vec![
            create_test_record(3, 9, "neutra", depression(1.0)),
            create_test_record(1, 9, "neutra", depression(2.0)),
            create_test_record(2, 23, "neutra", depression(3.0)),
        ];
        let days: Vec<String> = daily_average_scores(&records)
            .keys()
            .map(|d| d.to_string())
            .collect();

        assert_eq!(days, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    }
}
