use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::controller::{Controller, DashboardError, Phase, RECORD_SOURCE_MESSAGE};
use crate::models::{StudentFilter, ALL_STUDENTS};
use crate::source::DashboardSource;
use crate::views::{JsonSink, ViewKind};

// ---

pub fn router<S>() -> Router<Arc<Controller<S>>>
where
    S: DashboardSource + 'static,
{
    // ---
    Router::new()
        .route("/dashboard", get(dashboard::<S>))
        .route("/filter", post(set_filter::<S>))
        .route("/refresh", post(refresh::<S>))
        .route("/students", get(students::<S>))
}

/// Body of every successful dashboard response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    status: Phase,
    filter: String,
    views: Map<String, Value>,
    failed_views: Vec<ViewKind>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Body of `POST /filter`; a missing `aluno` selects every student.
#[derive(Debug, Deserialize)]
struct FilterRequest {
    aluno: Option<String>,
}

async fn dashboard<S: DashboardSource>(
    State(controller): State<Arc<Controller<S>>>,
) -> impl IntoResponse {
    // ---
    debug!("GET /dashboard");
    (StatusCode::OK, Json(render(&controller).await)).into_response()
}

async fn set_filter<S: DashboardSource>(
    State(controller): State<Arc<Controller<S>>>,
    Json(body): Json<FilterRequest>,
) -> impl IntoResponse {
    // ---
    let filter = StudentFilter::parse(body.aluno.as_deref().unwrap_or(ALL_STUDENTS));
    info!("POST /filter - {}", filter.as_str());

    controller.set_filter(filter).await;
    (StatusCode::OK, Json(render(&controller).await)).into_response()
}

async fn refresh<S: DashboardSource>(
    State(controller): State<Arc<Controller<S>>>,
) -> impl IntoResponse {
    // ---
    info!("POST /refresh");

    match controller.refresh().await {
        Ok(()) => (StatusCode::OK, Json(render(&controller).await)).into_response(),
        Err(e @ DashboardError::RefreshInProgress) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
        Err(DashboardError::RecordSource(detail)) => {
            error!("Refresh failed: {}", detail);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: RECORD_SOURCE_MESSAGE.to_string(),
                }),
            )
                .into_response()
        }
        Err(e @ DashboardError::Terminal(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn students<S: DashboardSource>(
    State(controller): State<Arc<Controller<S>>>,
) -> impl IntoResponse {
    // ---
    (StatusCode::OK, Json(controller.students().await)).into_response()
}

/// Push the current views through a JSON sink and wrap them with status.
async fn render<S: DashboardSource>(controller: &Controller<S>) -> DashboardResponse {
    // ---
    let mut sink = JsonSink::default();
    let failed_views = controller.publish(&mut sink).await;

    DashboardResponse {
        status: controller.phase().await,
        filter: controller.filter().await.as_str().to_string(),
        views: sink.views,
        failed_views,
    }
}
