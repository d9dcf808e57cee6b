//! Poll storage and the vote ledger
//!
//! Both backends implement the same three traits. `PollRepository::submit_vote`
//! is the only write path used for ballots: it records the vote and increments
//! the option as a single unit, so a failure at any step leaves neither change
//! behind.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewPoll, Poll, PollOption};
use crate::error::AppResult;

pub mod memory;
pub mod polls;

pub use memory::MemoryPollRepository;
pub use polls::PgPollRepository;

/// Result of a conditional ledger insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    AlreadyVoted,
}

/// Result of a combined record-and-increment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was recorded and counted; carries the poll with fresh counts
    Counted(Poll),
    PollNotFound,
    InvalidOption,
    AlreadyVoted,
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn create_poll(&self, poll: NewPoll) -> AppResult<Poll>;

    async fn get_poll(&self, poll_id: Uuid) -> AppResult<Option<Poll>>;

    /// All polls with their options, oldest first
    async fn list_polls(&self) -> AppResult<Vec<Poll>>;

    /// Remove the poll's options, then the poll. Returns false if absent.
    async fn delete_poll(&self, poll_id: Uuid) -> AppResult<bool>;

    /// In-place `votes + 1` on one option. None if poll or index is unknown.
    async fn increment_option(
        &self,
        poll_id: Uuid,
        option_index: usize,
    ) -> AppResult<Option<PollOption>>;
}

#[async_trait]
pub trait VoteLedger: Send + Sync {
    async fn has_voted(&self, poll_id: Uuid, voter_id: &str) -> AppResult<bool>;

    /// Insert-if-absent on (poll_id, voter_id)
    async fn record_vote(&self, poll_id: Uuid, voter_id: &str) -> AppResult<RecordOutcome>;
}

#[async_trait]
pub trait PollRepository: PollStore + VoteLedger {
    /// Record the ballot and count it in one transaction
    async fn submit_vote(
        &self,
        poll_id: Uuid,
        option_index: usize,
        voter_id: &str,
    ) -> AppResult<VoteOutcome>;
}
