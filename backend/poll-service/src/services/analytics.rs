use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::Poll;
use crate::error::AppResult;
use crate::repository::PollRepository;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_votes: i64,
    pub most_popular_poll: Option<PopularPoll>,
    pub vote_trends: Vec<VoteTrend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularPoll {
    pub question: String,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTrend {
    pub question: String,
    pub options: Vec<OptionTally>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option: String,
    pub votes: i64,
}

/// Aggregate a poll listing. Ties for most popular go to the earliest poll.
pub fn summarize(polls: &[Poll]) -> Analytics {
    let mut total_votes = 0;
    let mut most_popular: Option<PopularPoll> = None;

    for poll in polls {
        let votes = poll.total_votes();
        total_votes += votes;
        if most_popular.as_ref().map_or(true, |best| votes > best.votes) {
            most_popular = Some(PopularPoll {
                question: poll.question.clone(),
                votes,
            });
        }
    }

    let vote_trends = polls
        .iter()
        .map(|poll| VoteTrend {
            question: poll.question.clone(),
            options: poll
                .options
                .iter()
                .map(|o| OptionTally {
                    option: o.label.clone(),
                    votes: o.votes,
                })
                .collect(),
        })
        .collect();

    Analytics {
        total_votes,
        most_popular_poll: most_popular,
        vote_trends,
    }
}

/// Recomputed from the store on every call
#[derive(Clone)]
pub struct AnalyticsService {
    repo: Arc<dyn PollRepository>,
}

impl AnalyticsService {
    pub fn new(repo: Arc<dyn PollRepository>) -> Self {
        Self { repo }
    }

    pub async fn snapshot(&self) -> AppResult<Analytics> {
        let polls = self.repo.list_polls().await?;
        Ok(summarize(&polls))
    }
}
