use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Poll;

/// Outbound frame: `{"event": "pollCreated", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PollEvent {
    PollCreated(Poll),
    PollUpdated(Poll),
    PollDeleted(Uuid),
    /// Delivered to a single observer only
    Error(String),
}

impl PollEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PollEvent::PollCreated(_) => "pollCreated",
            PollEvent::PollUpdated(_) => "pollUpdated",
            PollEvent::PollDeleted(_) => "pollDeleted",
            PollEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> String {
        // Poll and Uuid serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Frames observers may send; relayed only for authenticated observers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WsInboundEvent {
    NewPoll(Poll),
    UpdatePoll(Poll),
    DeletePoll(Uuid),
}

impl WsInboundEvent {
    pub fn into_outbound(self) -> PollEvent {
        match self {
            WsInboundEvent::NewPoll(poll) => PollEvent::PollCreated(poll),
            WsInboundEvent::UpdatePoll(poll) => PollEvent::PollUpdated(poll),
            WsInboundEvent::DeletePoll(poll_id) => PollEvent::PollDeleted(poll_id),
        }
    }
}
