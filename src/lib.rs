//! Instructor panel analytics for student emotional self-assessments.
//!
//! Raw records from the assessment backend flow through the normalizer into
//! canonical [`Record`]s, from which the alert rule engine and the
//! aggregator derive alerts and chart views. The [`Controller`] owns the
//! in-memory cache and the current student filter; the `routes` gateway
//! exposes its views over HTTP.
//!
//! Module boundaries follow the gateway pattern: siblings depend on the
//! re-exports below rather than on each other's internals wherever possible.

pub mod aggregate;
pub mod alerts;
pub mod config;
pub mod controller;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod source;
pub mod views;

pub use config::Config;
pub use controller::{Controller, DashboardError, Phase};
pub use models::{Alert, Provenance, Record, RecordId, Scores, StudentFilter};
pub use source::{DashboardSource, HttpSource};
pub use views::{DashboardViews, ViewSink};
