//! Route gateway for the panel API.
//!
//! `main.rs` only sees [`router`]; individual endpoints live in sibling
//! modules and export sub-routers merged here.

use std::sync::Arc;

use axum::Router;

use crate::controller::Controller;
use crate::source::DashboardSource;

mod dashboard;
mod health;

// ---

pub fn router<S>(controller: Arc<Controller<S>>) -> Router
where
    S: DashboardSource + 'static,
{
    // ---
    Router::new()
        .merge(dashboard::router())
        .merge(health::router())
        .with_state(controller)
}
