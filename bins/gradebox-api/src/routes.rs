// Route table for the Gradebox API

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run-test", post(handlers::run_submission))
        .route("/execute", post(handlers::run_submission))
        .route("/status", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
}
