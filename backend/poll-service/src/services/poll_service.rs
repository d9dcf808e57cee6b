use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{normalize_voter_id, NewPoll, Poll};
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middleware::Principal;
use crate::repository::{PollRepository, VoteOutcome};
use crate::websocket::{PollEvent, PollEventHub};

/// Poll lifecycle and ballot submission
///
/// Every committed mutation is published on the hub after the store returns;
/// publishing never blocks the caller.
#[derive(Clone)]
pub struct PollService {
    repo: Arc<dyn PollRepository>,
    hub: PollEventHub,
}

impl PollService {
    pub fn new(repo: Arc<dyn PollRepository>, hub: PollEventHub) -> Self {
        Self { repo, hub }
    }

    pub fn hub(&self) -> &PollEventHub {
        &self.hub
    }

    pub async fn create(
        &self,
        question: &str,
        options: &[String],
        principal: Option<&Principal>,
    ) -> AppResult<Poll> {
        let principal = principal.ok_or(AppError::Unauthorized)?;
        let new_poll = NewPoll::new(question, options, &principal.id)?;

        let poll = self.repo.create_poll(new_poll).await?;
        info!(poll_id = %poll.id, creator = %principal.id, options = poll.options.len(), "poll created");

        self.hub.publish(&PollEvent::PollCreated(poll.clone()));
        Ok(poll)
    }

    pub async fn get(&self, poll_id: Uuid) -> AppResult<Poll> {
        self.repo
            .get_poll(poll_id)
            .await?
            .ok_or_else(AppError::poll_not_found)
    }

    pub async fn list(&self) -> AppResult<Vec<Poll>> {
        self.repo.list_polls().await
    }

    /// Anonymous ballot. Pre-checks give precise errors; the store re-checks
    /// inside its transaction, which is what actually guarantees one vote per
    /// voter.
    pub async fn vote(&self, poll_id: Uuid, option_index: i64, voter_id: &str) -> AppResult<Poll> {
        let voter_id = normalize_voter_id(voter_id)?;

        let poll = match self.repo.get_poll(poll_id).await? {
            Some(poll) => poll,
            None => {
                metrics::record_vote("not_found");
                return Err(AppError::poll_not_found());
            }
        };

        let index = match usize::try_from(option_index) {
            Ok(index) if index < poll.options.len() => index,
            _ => {
                metrics::record_vote("invalid_option");
                return Err(AppError::InvalidOption);
            }
        };

        match self.repo.submit_vote(poll_id, index, voter_id).await? {
            VoteOutcome::Counted(updated) => {
                metrics::record_vote("counted");
                info!(%poll_id, option_index = index, "vote counted");
                self.hub.publish(&PollEvent::PollUpdated(updated.clone()));
                Ok(updated)
            }
            VoteOutcome::AlreadyVoted => {
                metrics::record_vote("already_voted");
                Err(AppError::AlreadyVoted)
            }
            VoteOutcome::InvalidOption => {
                metrics::record_vote("invalid_option");
                Err(AppError::InvalidOption)
            }
            VoteOutcome::PollNotFound => {
                // Deleted between the pre-check and the transaction
                metrics::record_vote("not_found");
                Err(AppError::poll_not_found())
            }
        }
    }

    pub async fn has_voted(&self, poll_id: Uuid, voter_id: &str) -> AppResult<bool> {
        let voter_id = normalize_voter_id(voter_id)?;
        if self.repo.get_poll(poll_id).await?.is_none() {
            return Err(AppError::poll_not_found());
        }
        self.repo.has_voted(poll_id, voter_id).await
    }

    pub async fn delete(&self, poll_id: Uuid, principal: Option<&Principal>) -> AppResult<()> {
        let principal = principal.ok_or(AppError::Unauthorized)?;

        if !self.repo.delete_poll(poll_id).await? {
            warn!(%poll_id, "delete requested for unknown poll");
            return Err(AppError::poll_not_found());
        }
        info!(%poll_id, by = %principal.id, "poll deleted");

        self.hub.publish(&PollEvent::PollDeleted(poll_id));
        Ok(())
    }
}
