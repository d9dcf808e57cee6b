use crate::{
    middleware::TokenVerifier,
    repository::PollRepository,
    services::{AnalyticsService, PollService},
    websocket::PollEventHub,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub polls: PollService,
    pub analytics: AnalyticsService,
    pub hub: PollEventHub,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(repo: Arc<dyn PollRepository>, hub: PollEventHub, verifier: TokenVerifier) -> Self {
        Self {
            polls: PollService::new(repo.clone(), hub.clone()),
            analytics: AnalyticsService::new(repo),
            hub,
            verifier: Arc::new(verifier),
        }
    }
}
