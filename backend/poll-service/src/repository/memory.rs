use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{PollRepository, PollStore, RecordOutcome, VoteLedger, VoteOutcome};
use crate::domain::{NewPoll, Poll, PollOption};
use crate::error::AppResult;

#[derive(Default)]
struct Inner {
    /// Insertion order is listing order
    polls: Vec<Poll>,
    ballots: HashSet<(Uuid, String)>,
}

impl Inner {
    fn poll_mut(&mut self, poll_id: Uuid) -> Option<&mut Poll> {
        self.polls.iter_mut().find(|p| p.id == poll_id)
    }

    fn increment(&mut self, poll_id: Uuid, option_index: usize) -> Option<PollOption> {
        let option = self.poll_mut(poll_id)?.options.get_mut(option_index)?;
        option.votes += 1;
        Some(option.clone())
    }

    fn record(&mut self, poll_id: Uuid, voter_id: &str) -> RecordOutcome {
        if self.ballots.insert((poll_id, voter_id.to_string())) {
            RecordOutcome::Recorded
        } else {
            RecordOutcome::AlreadyVoted
        }
    }
}

/// In-process store for local development and tests.
///
/// Every operation runs under one mutex guard, which gives the same
/// atomicity the PostgreSQL backend gets from its transactions.
#[derive(Default)]
pub struct MemoryPollRepository {
    inner: Mutex<Inner>,
}

impl MemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryPollRepository {
    async fn create_poll(&self, new_poll: NewPoll) -> AppResult<Poll> {
        // Stamped under the guard so insertion order matches created_at
        let mut inner = self.inner.lock();
        let poll = Poll {
            id: Uuid::new_v4(),
            question: new_poll.question,
            creator_id: new_poll.creator_id,
            created_at: Utc::now(),
            options: new_poll
                .options
                .into_iter()
                .map(|label| PollOption {
                    id: Uuid::new_v4(),
                    label,
                    votes: 0,
                })
                .collect(),
        };

        inner.polls.push(poll.clone());
        Ok(poll)
    }

    async fn get_poll(&self, poll_id: Uuid) -> AppResult<Option<Poll>> {
        Ok(self
            .inner
            .lock()
            .polls
            .iter()
            .find(|p| p.id == poll_id)
            .cloned())
    }

    async fn list_polls(&self) -> AppResult<Vec<Poll>> {
        Ok(self.inner.lock().polls.clone())
    }

    async fn delete_poll(&self, poll_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.lock();
        let before = inner.polls.len();
        inner.polls.retain(|p| p.id != poll_id);
        Ok(inner.polls.len() != before)
    }

    async fn increment_option(
        &self,
        poll_id: Uuid,
        option_index: usize,
    ) -> AppResult<Option<PollOption>> {
        Ok(self.inner.lock().increment(poll_id, option_index))
    }
}

#[async_trait]
impl VoteLedger for MemoryPollRepository {
    async fn has_voted(&self, poll_id: Uuid, voter_id: &str) -> AppResult<bool> {
        Ok(self
            .inner
            .lock()
            .ballots
            .contains(&(poll_id, voter_id.to_string())))
    }

    async fn record_vote(&self, poll_id: Uuid, voter_id: &str) -> AppResult<RecordOutcome> {
        Ok(self.inner.lock().record(poll_id, voter_id))
    }
}

#[async_trait]
impl PollRepository for MemoryPollRepository {
    async fn submit_vote(
        &self,
        poll_id: Uuid,
        option_index: usize,
        voter_id: &str,
    ) -> AppResult<VoteOutcome> {
        let mut inner = self.inner.lock();

        let Some(poll) = inner.polls.iter().find(|p| p.id == poll_id) else {
            return Ok(VoteOutcome::PollNotFound);
        };
        if option_index >= poll.options.len() {
            return Ok(VoteOutcome::InvalidOption);
        }
        if inner.record(poll_id, voter_id) == RecordOutcome::AlreadyVoted {
            return Ok(VoteOutcome::AlreadyVoted);
        }

        // Existence and index were checked under this same guard
        let counted = inner
            .increment(poll_id, option_index)
            .and_then(|_| inner.polls.iter().find(|p| p.id == poll_id).cloned());

        Ok(match counted {
            Some(poll) => VoteOutcome::Counted(poll),
            None => VoteOutcome::PollNotFound,
        })
    }
}
