//! Canonical data models for the instructor panel.
//!
//! Everything downstream of the normalizer works on these types only; raw
//! backend payloads never leak past `normalize.rs`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Student key used when a record or alert carries no student id.
pub const UNKNOWN_STUDENT: &str = "unknown";

/// Filter value meaning "every student".
pub const ALL_STUDENTS: &str = "__all__";

pub const DEFAULT_EMOTION: &str = "neutra";
pub const DEFAULT_TENDENCY: &str = "Sem tendências significativas";

/// Questionnaire axes, in display order.
pub const AXES: [&str; 3] = ["tdah", "ansiedade", "depressao"];

/// Record identifier as sent by the backend (or synthesized from position).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    // ---
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Per-axis questionnaire scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    // ---
    pub tdah: f64,
    pub ansiedade: f64,
    pub depressao: f64,
}

/// A normalized self-assessment record.
///
/// Serializes back to the backend's field names so a canonical record can be
/// fed through the normalizer again unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    // ---
    pub id: RecordId,

    #[serde(rename = "aluno_id")]
    pub student_id: Option<String>,

    #[serde(rename = "aluno_nome")]
    pub student_name: Option<String>,

    #[serde(rename = "texto")]
    pub text: String,

    /// Raw questionnaire answers keyed by axis.
    #[serde(rename = "respostas")]
    pub answers: BTreeMap<String, String>,

    #[serde(rename = "emocao")]
    pub emotion: String,

    #[serde(rename = "tendencia")]
    pub tendency: String,

    #[serde(rename = "pontuacao")]
    pub scores: Scores,

    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Student id used for grouping and filtering, `"unknown"` when absent.
    pub fn student_key(&self) -> &str {
        self.student_id.as_deref().unwrap_or(UNKNOWN_STUDENT)
    }
}

/// Where an alert came from. Kinds never compare equal to each other, even
/// when their inner values coincide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    // ---
    /// Cohort alert: how many of the student's records share the tendency.
    Occurrences(u32),
    /// Per-record alert: the record that crossed the threshold.
    Record(RecordId),
}

/// A behavioral alert, either derived locally or supplied by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    // ---
    pub student_id: String,
    pub student_name: Option<String>,
    pub message: String,
    pub tendency: Option<String>,
    pub provenance: Option<Provenance>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Owned form of the alert dedup key.
pub type AlertKey = (String, String, Option<String>, Option<Provenance>);

impl Alert {
    pub fn dedup_key(&self) -> AlertKey {
        (
            self.student_id.clone(),
            self.message.clone(),
            self.tendency.clone(),
            self.provenance.clone(),
        )
    }

    pub fn occurrence_count(&self) -> Option<u32> {
        match self.provenance {
            Some(Provenance::Occurrences(n)) => Some(n),
            _ => None,
        }
    }
}

/// Current student selection of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StudentFilter {
    // ---
    #[default]
    All,
    Student(String),
}

impl StudentFilter {
    /// Parse a selector value; blank or `"__all__"` selects everyone.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL_STUDENTS {
            StudentFilter::All
        } else {
            StudentFilter::Student(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StudentFilter::All => ALL_STUDENTS,
            StudentFilter::Student(id) => id,
        }
    }

    pub fn matches(&self, student_key: &str) -> bool {
        match self {
            StudentFilter::All => true,
            StudentFilter::Student(id) => id == student_key,
        }
    }

    /// Snapshot of the records this filter selects, in cache order.
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|r| self.matches(r.student_key()))
            .cloned()
            .collect()
    }
}
