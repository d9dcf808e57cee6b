use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Minimum number of non-empty options a poll must carry
pub const MIN_POLL_OPTIONS: usize = 2;

/// Longest voter token accepted from clients
pub const MAX_VOTER_ID_LEN: usize = 128;

/// Poll entity - a question with its ordered options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Sum of the vote counts of every option
    pub fn total_votes(&self) -> i64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

/// Poll option - display order is the position in `Poll::options`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: Uuid,
    #[serde(rename = "option")]
    pub label: String,
    pub votes: i64,
}

/// Validated input for creating a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    pub creator_id: String,
}

impl NewPoll {
    /// Trim the question and labels, drop blank labels, and reject polls
    /// that end up without a question or with fewer than two options.
    pub fn new(question: &str, options: &[String], creator_id: &str) -> AppResult<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Poll question is required".to_string()));
        }

        let options: Vec<String> = options
            .iter()
            .map(|label| label.trim())
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        if options.len() < MIN_POLL_OPTIONS {
            return Err(AppError::Validation(format!(
                "Poll must have at least {MIN_POLL_OPTIONS} non-empty options"
            )));
        }

        Ok(Self {
            question: question.to_string(),
            options,
            creator_id: creator_id.to_string(),
        })
    }
}

/// Normalize a client-supplied voter token
pub fn normalize_voter_id(voter_id: &str) -> AppResult<&str> {
    let voter_id = voter_id.trim();
    if voter_id.is_empty() {
        return Err(AppError::Validation("voterId is required".to_string()));
    }
    if voter_id.chars().count() > MAX_VOTER_ID_LEN {
        return Err(AppError::Validation(format!(
            "voterId must be at most {MAX_VOTER_ID_LEN} characters"
        )));
    }
    Ok(voter_id)
}
