//! Render-ready views and the sink that consumes them.
//!
//! The dashboard never draws anything itself: it hands each view to a
//! [`ViewSink`] (the HTTP layer, a terminal UI, a test double). A sink may
//! reject a view; the rejection is logged and the remaining views are still
//! delivered.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregate::{self, LabelCounts};
use crate::models::{Alert, Record, RecordId, Scores, ALL_STUDENTS, UNKNOWN_STUDENT};

// ---

pub const ALL_STUDENTS_LABEL: &str = "Todos os alunos";

/// Bar/pie chart data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountChart {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

impl From<&LabelCounts> for CountChart {
    fn from(counts: &LabelCounts) -> Self {
        let (labels, values) = counts.iter().map(|(l, c)| (l.to_string(), c)).unzip();
        CountChart { labels, values }
    }
}

/// Line chart data: one point per day and axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreTrend {
    pub dates: Vec<String>,
    pub tdah: Vec<f64>,
    pub ansiedade: Vec<f64>,
    pub depressao: Vec<f64>,
}

impl From<&BTreeMap<NaiveDate, Scores>> for ScoreTrend {
    fn from(daily: &BTreeMap<NaiveDate, Scores>) -> Self {
        // ---
        let mut trend = ScoreTrend::default();
        for (day, avg) in daily {
            trend.dates.push(day.format("%Y-%m-%d").to_string());
            trend.tdah.push(avg.tdah);
            trend.ansiedade.push(avg.ansiedade);
            trend.depressao.push(avg.depressao);
        }
        trend
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertItem {
    pub student_label: String,
    pub message: String,
    pub tendency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurrence_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordItem {
    pub id: RecordId,
    pub student_label: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub emotion: String,
    pub tendency: String,
    pub scores: Scores,
}

/// One entry of the student selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentOption {
    pub value: String,
    pub label: String,
}

/// Every view the dashboard publishes for one filter selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardViews {
    pub emotions: CountChart,
    pub tendencies: CountChart,
    pub scores: ScoreTrend,
    pub alerts: Vec<AlertItem>,
    pub records: Vec<RecordItem>,
}

impl DashboardViews {
    /// Build the views over an already-filtered record set and its alerts.
    pub fn build(records: &[Record], alerts: &[Alert]) -> Self {
        // ---
        let names = student_names(records);

        let alerts = alerts
            .iter()
            .map(|alert| AlertItem {
                student_label: display_label(
                    alert
                        .student_name
                        .as_deref()
                        .or_else(|| names.get(alert.student_id.as_str()).copied()),
                    &alert.student_id,
                ),
                message: alert.message.clone(),
                tendency: alert.tendency.clone().unwrap_or_default(),
                occurrence_count: alert.occurrence_count(),
                created_at: alert.created_at,
            })
            .collect();

        let mut sorted: Vec<&Record> = records.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let records_view = sorted
            .into_iter()
            .map(|r| RecordItem {
                id: r.id.clone(),
                student_label: display_label(r.student_name.as_deref(), r.student_key()),
                created_at: r.created_at,
                text: r.text.clone(),
                emotion: r.emotion.clone(),
                tendency: r.tendency.clone(),
                scores: r.scores,
            })
            .collect();

        DashboardViews {
            emotions: CountChart::from(&aggregate::emotion_counts(records)),
            tendencies: CountChart::from(&aggregate::tendency_counts(records)),
            scores: ScoreTrend::from(&aggregate::daily_average_scores(records)),
            alerts,
            records: records_view,
        }
    }

    /// Hand each view to `sink`. Returns the kinds the sink rejected.
    pub fn publish<K: ViewSink + ?Sized>(&self, sink: &mut K) -> Vec<ViewKind> {
        // ---
        let views = [
            View::Emotions(&self.emotions),
            View::Tendencies(&self.tendencies),
            View::Scores(&self.scores),
            View::Alerts(&self.alerts),
            View::Records(&self.records),
        ];

        let mut failed = Vec::new();
        for view in views {
            let kind = view.kind();
            if let Err(e) = sink.render(view) {
                tracing::error!("Failed to render {} view: {:#}", kind.as_str(), e);
                failed.push(kind);
            }
        }
        failed
    }
}

/// Student selector entries: "everyone" first, then students in first-seen order.
pub fn student_directory(records: &[Record]) -> Vec<StudentOption> {
    // ---
    let mut options = vec![StudentOption {
        value: ALL_STUDENTS.to_string(),
        label: ALL_STUDENTS_LABEL.to_string(),
    }];

    for record in records {
        let id = record.student_key();
        if options.iter().skip(1).any(|o| o.value == id) {
            continue;
        }
        let label = match record.student_name.as_deref() {
            Some(name) => format!("{name} (id:{id})"),
            None => format!("Aluno id:{id}"),
        };
        options.push(StudentOption {
            value: id.to_string(),
            label,
        });
    }

    options
}

fn student_names(records: &[Record]) -> HashMap<&str, &str> {
    // ---
    let mut names = HashMap::new();
    for record in records {
        if let Some(name) = record.student_name.as_deref() {
            names.entry(record.student_key()).or_insert(name);
        }
    }
    names
}

fn display_label(name: Option<&str>, student_key: &str) -> String {
    match name {
        Some(name) => name.to_string(),
        None if student_key == UNKNOWN_STUDENT => "Aluno desconhecido".to_string(),
        None => format!("Aluno id:{student_key}"),
    }
}

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Emotions,
    Tendencies,
    Scores,
    Alerts,
    Records,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Emotions => "emotions",
            ViewKind::Tendencies => "tendencies",
            ViewKind::Scores => "scores",
            ViewKind::Alerts => "alerts",
            ViewKind::Records => "records",
        }
    }
}

/// A single view handed to a sink.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    Emotions(&'a CountChart),
    Tendencies(&'a CountChart),
    Scores(&'a ScoreTrend),
    Alerts(&'a [AlertItem]),
    Records(&'a [RecordItem]),
}

impl View<'_> {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Emotions(_) => ViewKind::Emotions,
            View::Tendencies(_) => ViewKind::Tendencies,
            View::Scores(_) => ViewKind::Scores,
            View::Alerts(_) => ViewKind::Alerts,
            View::Records(_) => ViewKind::Records,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            View::Emotions(chart) | View::Tendencies(chart) => serde_json::to_value(chart),
            View::Scores(trend) => serde_json::to_value(trend),
            View::Alerts(items) => serde_json::to_value(items),
            View::Records(items) => serde_json::to_value(items),
        }
    }
}

/// Consumer of dashboard views.
pub trait ViewSink {
    fn render(&mut self, view: View<'_>) -> Result<()>;
}

/// Sink collecting every view into a JSON object keyed by view kind.
#[derive(Debug, Default)]
pub struct JsonSink {
    pub views: Map<String, Value>,
}

impl ViewSink for JsonSink {
    fn render(&mut self, view: View<'_>) -> Result<()> {
        let value = view.to_json()?;
        self.views.insert(view.kind().as_str().to_string(), value);
        Ok(())
    }
}
