//! Record normalizer.
//!
//! Maps the loosely-typed JSON objects returned by `/registros` and `/alertas`
//! onto [`Record`] and [`Alert`]. Every field has a total default, so these
//! functions never fail: missing keys, nulls and wrongly-typed values all
//! collapse to the canonical defaults.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{
    Alert, Provenance, Record, RecordId, Scores, AXES, DEFAULT_EMOTION, DEFAULT_TENDENCY,
    UNKNOWN_STUDENT,
};

// ---

/// Message used for backend alerts that carry no text of their own.
pub const DEFAULT_ALERT_MESSAGE: &str = "Alerta gerado";

/// Emotion labels the analysis backend may send in English.
const EMOTION_TRANSLATIONS: [(&str, &str); 8] = [
    ("nervousness", "nervoso"),
    ("happiness", "feliz"),
    ("sadness", "triste"),
    ("anger", "irritado"),
    ("fear", "com medo"),
    ("surprise", "surpreso"),
    ("neutral", "neutra"),
    ("excitement", "animado"),
];

/// Normalize a batch of raw records, stamping missing dates with the current time.
pub fn normalize(raw: &[Value]) -> Vec<Record> {
    normalize_at(raw, Utc::now())
}

/// Normalize a batch of raw records using `now` as the ingestion time.
///
/// Output order matches input order. Records without an `id` get their
/// 1-based position in the batch.
pub fn normalize_at(raw: &[Value], now: DateTime<Utc>) -> Vec<Record> {
    // ---
    raw.iter()
        .enumerate()
        .map(|(idx, item)| normalize_record(idx, item, now))
        .collect()
}

fn normalize_record(idx: usize, item: &Value, now: DateTime<Utc>) -> Record {
    // ---
    Record {
        id: item
            .get("id")
            .and_then(record_id)
            .unwrap_or(RecordId::Number(idx as i64 + 1)),
        student_id: first_present(item, &["aluno_id", "alunoId"]).and_then(identifier),
        student_name: first_text(item, &["aluno_nome", "nome_aluno"]),
        text: item.get("texto").and_then(text_value).unwrap_or_default(),
        answers: item.get("respostas").map(answers).unwrap_or_default(),
        emotion: normalize_emotion(first_present(item, &["emocao", "emotion"])),
        tendency: first_text(item, &["tendencia"])
            .unwrap_or_else(|| DEFAULT_TENDENCY.to_string()),
        scores: first_present(item, &["pontuacao", "score"])
            .map(scores)
            .unwrap_or_default(),
        created_at: first_present(item, &["created_at", "data"])
            .and_then(timestamp)
            .unwrap_or(now),
    }
}

/// Normalize alerts supplied by the backend.
pub fn normalize_alerts(raw: &[Value]) -> Vec<Alert> {
    // ---
    raw.iter()
        .map(|item| Alert {
            student_id: first_present(item, &["aluno_id", "alunoId"])
                .and_then(identifier)
                .unwrap_or_else(|| UNKNOWN_STUDENT.to_string()),
            student_name: first_text(item, &["aluno_nome", "nome_aluno"]),
            message: first_text(item, &["message", "mensagem", "message_pt"])
                .unwrap_or_else(|| DEFAULT_ALERT_MESSAGE.to_string()),
            tendency: first_text(item, &["tendencia"]),
            provenance: alert_provenance(item),
            created_at: item.get("created_at").and_then(timestamp),
        })
        .collect()
}

/// Lowercase an emotion label and translate it when it is one of the known
/// English labels. Unknown labels pass through lowercased.
pub fn translate_emotion(label: &str) -> String {
    // ---
    let lower = label.to_lowercase();
    EMOTION_TRANSLATIONS
        .iter()
        .find(|(english, _)| *english == lower)
        .map(|(_, local)| local.to_string())
        .unwrap_or(lower)
}

fn normalize_emotion(value: Option<&Value>) -> String {
    // ---
    // The analysis endpoint nests the label as `{principal, probabilidades}`.
    let label = match value {
        Some(Value::Object(map)) => map.get("principal").and_then(text_value),
        Some(other) => text_value(other),
        None => None,
    };

    match label {
        Some(label) if !label.is_empty() => translate_emotion(&label),
        _ => DEFAULT_EMOTION.to_string(),
    }
}

/// Parse a timestamp in any of the shapes the backend has been seen to emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---

/// First value under `keys` that is present and not null.
fn first_present<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find(|value| !value.is_null())
}

/// First non-blank textual value under `keys`.
fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .filter_map(text_value)
        .find(|text| !text.trim().is_empty())
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn identifier(value: &Value) -> Option<String> {
    text_value(value).filter(|id| !id.trim().is_empty())
}

fn record_id(value: &Value) -> Option<RecordId> {
    // ---
    match value {
        Value::Number(n) => Some(
            n.as_i64()
                .map(RecordId::Number)
                .unwrap_or_else(|| RecordId::Text(n.to_string())),
        ),
        Value::String(s) if !s.is_empty() => Some(RecordId::Text(s.clone())),
        _ => None,
    }
}

fn answers(value: &Value) -> BTreeMap<String, String> {
    // ---
    let Some(map) = value.as_object() else {
        return BTreeMap::new();
    };

    AXES.iter()
        .filter_map(|axis| {
            map.get(*axis)
                .and_then(text_value)
                .map(|answer| (axis.to_string(), answer))
        })
        .collect()
}

fn scores(value: &Value) -> Scores {
    // ---
    let Some(map) = value.as_object() else {
        return Scores::default();
    };

    Scores {
        tdah: axis_score(map, "tdah"),
        ansiedade: axis_score(map, "ansiedade"),
        depressao: axis_score(map, "depressao"),
    }
}

fn axis_score(map: &Map<String, Value>, axis: &str) -> f64 {
    // ---
    let parsed = match map.get(axis) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        // Epoch milliseconds
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn alert_provenance(item: &Value) -> Option<Provenance> {
    // ---
    let occurrences = item
        .get("ocorrencias")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok());

    match occurrences {
        Some(n) => Some(Provenance::Occurrences(n)),
        None => item
            .get("registro_id")
            .and_then(record_id)
            .map(Provenance::Record),
    }
}
