use actix_web::{delete, get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{error::AppError, middleware::Principal, routes::parse_poll_id, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_index: i64,
    pub voter_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotedQuery {
    #[serde(default)]
    pub voter_id: String,
}

/// GET /api/polls
#[get("/api/polls")]
pub async fn list_polls(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let polls = state.polls.list().await?;
    Ok(HttpResponse::Ok().json(polls))
}

/// POST /api/polls
#[post("/api/polls")]
pub async fn create_poll(
    state: web::Data<AppState>,
    principal: Option<Principal>,
    body: web::Json<CreatePollRequest>,
) -> Result<HttpResponse, AppError> {
    let poll = state
        .polls
        .create(&body.question, &body.options, principal.as_ref())
        .await?;
    Ok(HttpResponse::Created().json(poll))
}

/// GET /api/polls/{id}
#[get("/api/polls/{id}")]
pub async fn get_poll(
    state: web::Data<AppState>,
    poll_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let poll_id = parse_poll_id(&poll_id)?;
    let poll = state.polls.get(poll_id).await?;
    Ok(HttpResponse::Ok().json(poll))
}

/// POST /api/polls/{id}/vote
/// Anonymous; one ballot per voter id per poll
#[post("/api/polls/{id}/vote")]
pub async fn vote(
    state: web::Data<AppState>,
    poll_id: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> Result<HttpResponse, AppError> {
    let poll_id = parse_poll_id(&poll_id)?;
    let poll = state
        .polls
        .vote(poll_id, body.option_index, &body.voter_id)
        .await?;
    Ok(HttpResponse::Ok().json(poll))
}

/// GET /api/polls/{id}/voted?voterId=...
#[get("/api/polls/{id}/voted")]
pub async fn has_voted(
    state: web::Data<AppState>,
    poll_id: web::Path<String>,
    query: web::Query<VotedQuery>,
) -> Result<HttpResponse, AppError> {
    let poll_id = parse_poll_id(&poll_id)?;
    let has_voted = state.polls.has_voted(poll_id, &query.voter_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "hasVoted": has_voted })))
}

/// DELETE /api/polls/{id}
#[delete("/api/polls/{id}")]
pub async fn delete_poll(
    state: web::Data<AppState>,
    principal: Option<Principal>,
    poll_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    // Authentication before lookup so anonymous callers learn nothing
    if principal.is_none() {
        return Err(AppError::Unauthorized);
    }
    let poll_id = parse_poll_id(&poll_id)?;
    state.polls.delete(poll_id, principal.as_ref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Poll deleted successfully" })))
}
