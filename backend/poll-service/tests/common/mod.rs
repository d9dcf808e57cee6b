#![allow(dead_code)]

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use poll_service::{
    middleware::{auth::Claims, Principal, TokenVerifier},
    repository::MemoryPollRepository,
    services::PollService,
    state::AppState,
    websocket::PollEventHub,
};
use std::sync::Arc;

pub const TEST_SECRET: &str = "poll-service-test-secret";

pub fn memory_state() -> AppState {
    AppState::new(
        Arc::new(MemoryPollRepository::new()),
        PollEventHub::new(),
        TokenVerifier::new(TEST_SECRET),
    )
}

pub fn memory_service() -> PollService {
    PollService::new(Arc::new(MemoryPollRepository::new()), PollEventHub::new())
}

pub fn principal(id: &str) -> Principal {
    Principal {
        id: id.to_string(),
        username: None,
    }
}

pub fn token_for(sub: &str, secret: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        username: None,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode test jwt")
}

pub fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
