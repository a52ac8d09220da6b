//! Backend collaborators: where records and alerts come from.
//!
//! [`DashboardSource`] is the seam the controller depends on; [`HttpSource`]
//! is the production implementation talking to the assessment backend.

use std::future::Future;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::Config;

// ---

pub const RECORDS_PATH: &str = "/registros";
pub const ALERTS_PATH: &str = "/alertas";

/// Supplier of raw, not yet normalized, records and alerts.
pub trait DashboardSource: Send + Sync {
    /// Fetch raw records. Any failure is fatal for the current view.
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Fetch raw alerts. Failures and empty results make the caller derive
    /// alerts locally.
    fn fetch_alerts(&self) -> impl Future<Output = Result<Vec<Value>>> + Send;
}

/// JSON-over-HTTP client for the assessment backend.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        // ---
        let base_url: String = base_url.into();
        HttpSource {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        HttpSource::new(cfg.backend_url.clone(), cfg.auth_token.clone())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        // ---
        let url = format!("{}{}", self.base_url, path);
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_json(&self, path: &str) -> Result<Value> {
        // ---
        tracing::debug!("Fetching {}{}", self.base_url, path);

        let response = self
            .get(path)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?
            .error_for_status()
            .with_context(|| format!("{path} returned an error status"))?;

        response
            .json::<Value>()
            .await
            .with_context(|| format!("{path} did not return valid JSON"))
    }
}

impl DashboardSource for HttpSource {
    async fn fetch_records(&self) -> Result<Vec<Value>> {
        // ---
        match self.fetch_json(RECORDS_PATH).await? {
            Value::Array(items) => {
                tracing::info!("Fetched {} raw records", items.len());
                Ok(items)
            }
            other => Err(anyhow!(
                "{RECORDS_PATH} returned {} instead of an array",
                json_kind(&other)
            )),
        }
    }

    async fn fetch_alerts(&self) -> Result<Vec<Value>> {
        // ---
        match self.fetch_json(ALERTS_PATH).await? {
            Value::Array(items) => {
                tracing::info!("Fetched {} raw alerts", items.len());
                Ok(items)
            }
            other => {
                tracing::debug!(
                    "{} returned {} instead of an array, treating as empty",
                    ALERTS_PATH,
                    json_kind(&other)
                );
                Ok(Vec::new())
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
