use actix_web::{get, web, HttpResponse};

use crate::{error::AppError, state::AppState};

/// GET /api/analytics
#[get("/api/analytics")]
pub async fn get_analytics(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let analytics = state.analytics.snapshot().await?;
    Ok(HttpResponse::Ok().json(analytics))
}
