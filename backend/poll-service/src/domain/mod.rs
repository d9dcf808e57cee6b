pub mod models;

pub use models::{normalize_voter_id, NewPoll, Poll, PollOption};
