//! Exactly-once redemption of authorization codes under contention.

mod common;

use std::sync::Arc;

use futures::future::join_all;
use oauth_core::OAuthError;

use common::*;

const CONCURRENT_REDEMPTIONS: usize = 50;
const RUNS: usize = 20;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_redemption_has_one_winner() {
    let h = harness().await;

    for run in 0..RUNS {
        let grant = h.authorize("read write", None).await;
        let request = Arc::new(exchange_request(&grant.code, None));

        let attempts = (0..CONCURRENT_REDEMPTIONS).map(|_| {
            let server = h.server.clone();
            let request = request.clone();
            tokio::spawn(async move { server.token(&request).await })
        });
        let results: Vec<_> = join_all(attempts).await.into_iter().map(Result::unwrap).collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        let replays = results
            .iter()
            .filter(|r| matches!(r, Err(OAuthError::CodeAlreadyUsed)))
            .count();

        assert_eq!(winners, 1, "run {run}: {winners} winners");
        assert_eq!(replays, CONCURRENT_REDEMPTIONS - 1, "run {run}: unexpected failure kinds");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_revocations_are_idempotent() {
    let h = harness().await;
    let token = Arc::new(h.user_token().await);

    let revocations = (0..CONCURRENT_REDEMPTIONS).map(|_| {
        let server = h.server.clone();
        let token = token.clone();
        tokio::spawn(async move { server.revoke(&token).await })
    });
    for result in join_all(revocations).await {
        result.unwrap().unwrap();
    }

    assert!(!h.server.introspect(&token).await.active);
}
