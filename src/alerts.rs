//! Alert rule engine.
//!
//! Derives alerts from normalized records when the backend does not supply
//! any. Two rule families run independently:
//! - cohort rules count how often a student's records share a tendency;
//! - record rules flag single records with a sad emotion or a high
//!   depression score.
//!
//! The output is deduplicated in first-occurrence order.

use std::collections::{HashMap, HashSet};

use crate::models::{Alert, Provenance, Record};

// ---

pub const DEPRESSION_MESSAGE: &str =
    "Padrão de humor compatível com depressão detectado no histórico.";
pub const ANXIETY_MESSAGE: &str = "Padrão recorrente de ansiedade detectado.";
pub const ADHD_MESSAGE: &str = "Possível padrão consistente de sintomas relacionados a TDAH.";
pub const DISTRESS_MESSAGE: &str = "Registro com sinal de sofrimento (emoção/pontuação).";

/// Emotion marker for a single-record distress alert.
const SAD_MARKER: &str = "triste";

/// Depression score at or above which a single record raises an alert.
const DISTRESS_SCORE: f64 = 3.0;

/// A threshold rule over the number of records sharing a tendency.
struct CohortRule {
    keywords: &'static [&'static str],
    min_occurrences: u32,
    message: &'static str,
}

impl CohortRule {
    fn matches(&self, tendency: &str, occurrences: u32) -> bool {
        occurrences >= self.min_occurrences && self.keywords.iter().any(|k| tendency.contains(k))
    }
}

// Depression fires on the first occurrence, anxiety on the second, ADHD on the third.
const COHORT_RULES: [CohortRule; 3] = [
    CohortRule {
        keywords: &["depre"],
        min_occurrences: 1,
        message: DEPRESSION_MESSAGE,
    },
    CohortRule {
        keywords: &["ansiedade", "ansioso", "nerv"],
        min_occurrences: 2,
        message: ANXIETY_MESSAGE,
    },
    CohortRule {
        keywords: &["tdah"],
        min_occurrences: 3,
        message: ADHD_MESSAGE,
    },
];

/// Derive the deduplicated alert set for `records`.
///
/// Cohort alerts come first (students and tendencies in order of first
/// appearance), followed by per-record alerts in record order.
pub fn derive_alerts(records: &[Record]) -> Vec<Alert> {
    // ---
    let mut alerts = cohort_alerts(records);
    alerts.extend(record_alerts(records));
    dedup_alerts(alerts)
}

/// Drop alerts whose dedup key was already seen; the first occurrence wins.
pub fn dedup_alerts(alerts: Vec<Alert>) -> Vec<Alert> {
    // ---
    let mut seen = HashSet::new();
    alerts
        .into_iter()
        .filter(|alert| seen.insert(alert.dedup_key()))
        .collect()
}

/// Lowercased tendency counts per student, in first-appearance order.
fn tendency_counts_by_student(records: &[Record]) -> Vec<(&str, Vec<(String, u32)>)> {
    // ---
    let mut groups: Vec<(&str, Vec<(String, u32)>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let student = record.student_key();
        let slot = *index.entry(student).or_insert_with(|| {
            groups.push((student, Vec::new()));
            groups.len() - 1
        });

        let tendency = record.tendency.to_lowercase();
        let counts = &mut groups[slot].1;
        match counts.iter_mut().find(|(seen, _)| *seen == tendency) {
            Some((_, count)) => *count += 1,
            None => counts.push((tendency, 1)),
        }
    }

    groups
}

fn cohort_alerts(records: &[Record]) -> Vec<Alert> {
    // ---
    let mut alerts = Vec::new();

    for (student, counts) in tendency_counts_by_student(records) {
        for (tendency, occurrences) in counts {
            for rule in COHORT_RULES.iter().filter(|r| r.matches(&tendency, occurrences)) {
                alerts.push(Alert {
                    student_id: student.to_string(),
                    student_name: None,
                    message: rule.message.to_string(),
                    tendency: Some(tendency.clone()),
                    provenance: Some(Provenance::Occurrences(occurrences)),
                    created_at: None,
                });
            }
        }
    }

    alerts
}

fn record_alerts(records: &[Record]) -> impl Iterator<Item = Alert> + '_ {
    // ---
    records
        .iter()
        .filter(|r| r.emotion.contains(SAD_MARKER) || r.scores.depressao >= DISTRESS_SCORE)
        .map(|r| Alert {
            student_id: r.student_key().to_string(),
            student_name: None,
            message: DISTRESS_MESSAGE.to_string(),
            tendency: Some(r.tendency.clone()),
            provenance: Some(Provenance::Record(r.id.clone())),
            created_at: None,
        })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{RecordId, Scores, DEFAULT_EMOTION, DEFAULT_TENDENCY, UNKNOWN_STUDENT};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn create_test_record(id: i64, student: Option<&str>, tendency: &str) -> Record {
        // ---
        Record {
            id: RecordId::Number(id),
            student_id: student.map(str::to_string),
            student_name: None,
            text: String::new(),
            answers: BTreeMap::new(),
            emotion: DEFAULT_EMOTION.to_string(),
            tendency: tendency.to_string(),
            scores: Scores::default(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        }
    }

    fn repeated(student: &str, tendency: &str, times: i64) -> Vec<Record> {
        (1..=times)
            .map(|id| create_test_record(id, Some(student), tendency))
            .collect()
    }

    #[test]
    fn test_depression_fires_on_first_occurrence() {
        // ---
        let alerts = derive_alerts(&repeated("1", "Tendência à Depressão leve", 1));

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, DEPRESSION_MESSAGE);
        assert_eq!(alerts[0].tendency.as_deref(), Some("tendência à depressão leve"));
        assert_eq!(alerts[0].occurrence_count(), Some(1));
    }

    #[test]
    fn test_anxiety_needs_two_occurrences() {
        // ---
        assert!(derive_alerts(&repeated("1", "Tendência a Ansiedade", 1)).is_empty());

        let alerts = derive_alerts(&repeated("1", "Tendência a Ansiedade", 2));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, ANXIETY_MESSAGE);
        assert_eq!(alerts[0].occurrence_count(), Some(2));
    }

    #[test]
    fn test_adhd_needs_three_occurrences() {
        // ---
        assert!(derive_alerts(&repeated("1", "Tendência a TDAH", 2)).is_empty());

        let alerts = derive_alerts(&repeated("1", "Tendência a TDAH", 3));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, ADHD_MESSAGE);
    }

    #[test]
    fn test_nervous_keyword_counts_as_anxiety() {
        // ---
        let alerts = derive_alerts(&repeated("1", "Aluno nervoso", 2));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, ANXIETY_MESSAGE);
    }

    #[test]
    fn test_tendency_counting_ignores_case() {
        // ---
        let records = vec![
            create_test_record(1, Some("1"), "Tendência a Ansiedade"),
            create_test_record(2, Some("1"), "TENDÊNCIA A ANSIEDADE"),
        ];
        let alerts = derive_alerts(&records);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].occurrence_count(), Some(2));
    }

    #[test]
    fn test_counts_are_per_student() {
        // ---
        let records = vec![
            create_test_record(1, Some("1"), "Tendência a Ansiedade"),
            create_test_record(2, Some("2"), "Tendência a Ansiedade"),
        ];
        assert!(derive_alerts(&records).is_empty());
    }

    #[test]
    fn test_rules_are_not_exclusive() {
        // ---
        let alerts = derive_alerts(&repeated("1", "Ansiedade e depressão", 2));
        let messages: Vec<&str> = alerts.iter().map(|a| a.message.as_str()).collect();

        assert_eq!(messages, vec![DEPRESSION_MESSAGE, ANXIETY_MESSAGE]);
    }

    #[test]
    fn test_sad_emotion_raises_record_alert() {
        // ---
        let mut record = create_test_record(7, Some("1"), DEFAULT_TENDENCY);
        record.emotion = "triste".to_string();
        let alerts = derive_alerts(&[record]);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, DISTRESS_MESSAGE);
        assert_eq!(
            alerts[0].provenance,
            Some(Provenance::Record(RecordId::Number(7)))
        );
        assert_eq!(alerts[0].tendency.as_deref(), Some(DEFAULT_TENDENCY));
    }

    #[test]
    fn test_depression_score_threshold() {
        // ---
        let mut below = create_test_record(1, Some("1"), DEFAULT_TENDENCY);
        below.scores.depressao = 2.9;
        assert!(derive_alerts(&[below]).is_empty());

        let mut at = create_test_record(2, Some("1"), DEFAULT_TENDENCY);
        at.scores.depressao = 3.0;
        assert_eq!(derive_alerts(&[at]).len(), 1);
    }

    #[test]
    fn test_cohort_alerts_precede_record_alerts() {
        // ---
        let mut record = create_test_record(1, Some("1"), "Tendência à Depressão leve");
        record.scores.depressao = 4.0;
        let alerts = derive_alerts(&[record]);

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, DEPRESSION_MESSAGE);
        assert_eq!(alerts[1].message, DISTRESS_MESSAGE);
    }

    #[test]
    fn test_duplicate_records_do_not_duplicate_alerts() {
        // ---
        let mut record = create_test_record(5, Some("1"), "Tendência à Depressão leve");
        record.emotion = "triste".to_string();
        let records = vec![record.clone(), record.clone(), record];

        let alerts = derive_alerts(&records);
        let keys: HashSet<_> = alerts.iter().map(Alert::dedup_key).collect();

        assert_eq!(keys.len(), alerts.len());
        // One cohort alert (3 occurrences) and one record alert for id 5
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].occurrence_count(), Some(3));
    }

    #[test]
    fn test_missing_student_groups_under_unknown() {
        // ---
        let records = vec![
            create_test_record(1, None, "Tendência a Ansiedade"),
            create_test_record(2, None, "Tendência a Ansiedade"),
        ];
        let alerts = derive_alerts(&records);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].student_id, UNKNOWN_STUDENT);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        // ---
        let first = Alert {
            student_id: "1".to_string(),
            student_name: Some("Ana".to_string()),
            message: "m".to_string(),
            tendency: None,
            provenance: None,
            created_at: None,
        };
        let second = Alert {
            student_name: Some("Outra".to_string()),
            ..first.clone()
        };

        let alerts = dedup_alerts(vec![first.clone(), second]);
        assert_eq!(alerts, vec![first]);
    }

    #[test]
    fn test_empty_input() {
        // ---
        assert!(derive_alerts(&[]).is_empty());
    }
}
