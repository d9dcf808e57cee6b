mod common;

use common::{labels, memory_service, principal};
use poll_service::{error::AppError, services::summarize, websocket::PollEvent};
use uuid::Uuid;

#[tokio::test]
async fn fruit_poll_counts_each_voter_once() {
    let service = memory_service();
    let creator = principal("creator-1");

    let poll = service
        .create("Best fruit?", &labels(&["Apple", "Banana", "Cherry"]), Some(&creator))
        .await
        .unwrap();
    assert!(poll.options.iter().all(|o| o.votes == 0));

    let after_v1 = service.vote(poll.id, 1, "v1").await.unwrap();
    assert_eq!(after_v1.options[1].votes, 1);

    service.vote(poll.id, 1, "v2").await.unwrap();
    let after_v3 = service.vote(poll.id, 2, "v3").await.unwrap();
    assert_eq!(
        after_v3.options.iter().map(|o| o.votes).collect::<Vec<_>>(),
        vec![0, 2, 1]
    );

    // Same voter, different option: still rejected
    assert_eq!(
        service.vote(poll.id, 0, "v1").await,
        Err(AppError::AlreadyVoted)
    );
    assert!(service.has_voted(poll.id, "v1").await.unwrap());
    assert!(!service.has_voted(poll.id, "v4").await.unwrap());

    let stored = service.get(poll.id).await.unwrap();
    assert_eq!(stored.total_votes(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_ballots_count_once() {
    let service = memory_service();
    let poll = service
        .create("Tabs or spaces?", &labels(&["Tabs", "Spaces"]), Some(&principal("c")))
        .await
        .unwrap();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let service = service.clone();
            let poll_id = poll.id;
            tokio::spawn(async move { service.vote(poll_id, i % 2, "same-voter").await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let counted = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Ok(Err(AppError::AlreadyVoted))))
        .count();

    assert_eq!(counted, 1);
    assert_eq!(rejected, 31);
    assert_eq!(service.get(poll.id).await.unwrap().total_votes(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn total_votes_equal_distinct_voters() {
    let service = memory_service();
    let poll = service
        .create("Pick one", &labels(&["a", "b", "c"]), Some(&principal("c")))
        .await
        .unwrap();

    // 20 distinct voters, each trying three times
    let handles: Vec<_> = (0..60)
        .map(|i| {
            let service = service.clone();
            let poll_id = poll.id;
            tokio::spawn(async move { service.vote(poll_id, i % 3, &format!("voter-{}", i % 20)).await })
        })
        .collect();
    futures::future::join_all(handles).await;

    assert_eq!(service.get(poll.id).await.unwrap().total_votes(), 20);
}

#[tokio::test]
async fn rejected_ballots_leave_no_trace() {
    let service = memory_service();
    let poll = service
        .create("Q?", &labels(&["x", "y"]), Some(&principal("c")))
        .await
        .unwrap();

    assert_eq!(service.vote(poll.id, 5, "v1").await, Err(AppError::InvalidOption));
    assert_eq!(service.vote(poll.id, -1, "v1").await, Err(AppError::InvalidOption));
    assert!(matches!(
        service.vote(poll.id, 0, "   ").await,
        Err(AppError::Validation(_))
    ));

    // The invalid attempts did not consume v1's ballot
    assert!(!service.has_voted(poll.id, "v1").await.unwrap());
    service.vote(poll.id, 0, "v1").await.unwrap();
}

#[tokio::test]
async fn unknown_poll_is_not_found() {
    let service = memory_service();
    let missing = Uuid::new_v4();

    assert!(matches!(service.get(missing).await, Err(AppError::NotFound(_))));
    assert!(matches!(service.vote(missing, 0, "v1").await, Err(AppError::NotFound(_))));
    assert!(matches!(service.has_voted(missing, "v1").await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn create_and_delete_require_a_principal() {
    let service = memory_service();
    assert_eq!(
        service.create("Q?", &labels(&["a", "b"]), None).await,
        Err(AppError::Unauthorized)
    );

    let poll = service
        .create("Q?", &labels(&["a", "b"]), Some(&principal("owner")))
        .await
        .unwrap();
    assert_eq!(service.delete(poll.id, None).await, Err(AppError::Unauthorized));
    assert!(service.get(poll.id).await.is_ok());
}

#[tokio::test]
async fn delete_is_terminal() {
    let service = memory_service();
    let poll = service
        .create("Q?", &labels(&["a", "b"]), Some(&principal("owner")))
        .await
        .unwrap();
    service.vote(poll.id, 0, "v1").await.unwrap();

    // Any authenticated principal may delete
    service.delete(poll.id, Some(&principal("someone-else"))).await.unwrap();

    assert!(matches!(service.get(poll.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(service.vote(poll.id, 0, "v2").await, Err(AppError::NotFound(_))));
    assert!(matches!(
        service.delete(poll.id, Some(&principal("owner"))).await,
        Err(AppError::NotFound(_))
    ));
    assert!(service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_stable_and_analytics_agree() {
    let service = memory_service();
    let c = principal("c");
    let first = service.create("First", &labels(&["a", "b"]), Some(&c)).await.unwrap();
    let second = service.create("Second", &labels(&["a", "b"]), Some(&c)).await.unwrap();

    service.vote(second.id, 0, "v1").await.unwrap();
    service.vote(second.id, 1, "v2").await.unwrap();
    service.vote(first.id, 0, "v1").await.unwrap();

    let listing = service.list().await.unwrap();
    assert_eq!(listing, service.list().await.unwrap());
    assert_eq!(
        listing.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let analytics = summarize(&listing);
    assert_eq!(analytics.total_votes, 3);
    let popular = analytics.most_popular_poll.unwrap();
    assert_eq!(popular.question, "Second");
    assert_eq!(popular.votes, 2);
    assert_eq!(analytics.vote_trends.len(), 2);
}

#[tokio::test]
async fn committed_mutations_reach_observers() {
    let service = memory_service();
    let (_id, mut rx) = service.hub().subscribe(false);

    let poll = service
        .create("Live?", &labels(&["yes", "no"]), Some(&principal("c")))
        .await
        .unwrap();
    let updated = service.vote(poll.id, 0, "v1").await.unwrap();
    let _ = service.vote(poll.id, 1, "v1").await;
    service.delete(poll.id, Some(&principal("c"))).await.unwrap();

    assert_eq!(rx.recv().await.unwrap(), PollEvent::PollCreated(poll.clone()).to_json());
    assert_eq!(rx.recv().await.unwrap(), PollEvent::PollUpdated(updated).to_json());
    // The rejected duplicate published nothing
    assert_eq!(rx.recv().await.unwrap(), PollEvent::PollDeleted(poll.id).to_json());
    assert!(rx.try_recv().is_err());
}
