pub mod analytics;
pub mod health;
pub mod polls;
pub mod wsroute;

use actix_web::{error::JsonPayloadError, web, HttpRequest};
use uuid::Uuid;

use crate::error::AppError;

/// Malformed bodies surface as VALIDATION_ERROR instead of actix's plain-text 400
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::Validation(format!("Invalid request body: {err}")).into()
}

/// An id that can never exist is simply not found.
pub(crate) fn parse_poll_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::poll_not_found())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(health::healthz)
        .service(health::metrics)
        .service(polls::list_polls)
        .service(polls::create_poll)
        .service(polls::get_poll)
        .service(polls::vote)
        .service(polls::has_voted)
        .service(polls::delete_poll)
        .service(analytics::get_analytics)
        .service(wsroute::ws_handler);
}
