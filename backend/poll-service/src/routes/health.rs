use actix_web::{get, HttpResponse};
use serde_json::json;

use crate::metrics as metrics_registry;

#[get("/healthz")]
pub async fn healthz() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "OK" }))
}

/// Prometheus text exposition
#[get("/metrics")]
pub async fn metrics() -> HttpResponse {
    match metrics_registry::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
