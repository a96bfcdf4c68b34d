//! The asymmetric failure policies of the two engines, observed through
//! the facade: the cart never rolls back, favorites always do.

#![allow(clippy::unwrap_used)]

use cloudberry_client::identity::IdentityEvent;
use cloudberry_client::remote::SyncOutcome;
use cloudberry_core::UserId;
use cloudberry_integration_tests::{TestHarness, dollars, product};
use uuid::Uuid;

async fn sign_in(harness: &TestHarness) -> UserId {
    let user = UserId::new(Uuid::new_v4());
    harness
        .client
        .handle_identity_event(IdentityEvent::LoginStarted)
        .await;
    harness
        .client
        .handle_identity_event(IdentityEvent::LoginSucceeded(user))
        .await;
    user
}

#[tokio::test]
async fn test_cart_keeps_local_state_when_the_mirror_fails() {
    let harness = TestHarness::new();
    sign_in(&harness).await;
    harness.cart_api.set_failing(true);

    let outcome = harness
        .client
        .cart()
        .add_item(&product("kettle"), dollars(40), 1)
        .settled()
        .await;

    assert!(outcome.is_failed());
    assert_eq!(harness.client.cart().count(), 1);
    assert_eq!(harness.cart_api.quantity(&product("kettle")), None);
}

#[tokio::test]
async fn test_favorites_roll_back_when_the_mirror_fails() {
    let harness = TestHarness::new();
    sign_in(&harness).await;
    harness.favorites_api.set_failing(true);

    let handle = harness.client.toggle_favorite(&product("mug"));
    // The optimistic flip is visible until the failure is processed.
    assert!(harness.client.is_favorite(&product("mug")));

    let outcome = handle.settled().await;
    assert!(outcome.is_failed());
    assert!(!harness.client.is_favorite(&product("mug")));
    assert!(!harness.favorites_api.contains(&product("mug")));
}

#[tokio::test]
async fn test_favorites_recover_once_the_backend_is_back() {
    let harness = TestHarness::new();
    sign_in(&harness).await;

    harness.favorites_api.set_failing(true);
    harness.client.toggle_favorite(&product("mug")).settled().await;
    assert!(!harness.client.is_favorite(&product("mug")));

    harness.favorites_api.set_failing(false);
    let outcome = harness.client.toggle_favorite(&product("mug")).settled().await;
    assert!(outcome.is_applied());
    assert!(harness.client.is_favorite(&product("mug")));
    assert!(harness.favorites_api.contains(&product("mug")));
}

#[tokio::test]
async fn test_guest_mutations_never_touch_the_remote() {
    let harness = TestHarness::new();

    let cart_outcome = harness
        .client
        .cart()
        .add_item(&product("kettle"), dollars(40), 1)
        .settled()
        .await;
    let favorite_outcome = harness
        .client
        .toggle_favorite(&product("mug"))
        .settled()
        .await;

    assert!(matches!(cart_outcome, SyncOutcome::Skipped));
    assert!(matches!(favorite_outcome, SyncOutcome::Skipped));
    assert!(harness.cart_api.set_calls().is_empty());
    assert!(!harness.favorites_api.contains(&product("mug")));
}

#[tokio::test]
async fn test_merge_with_unreachable_backend_keeps_the_guest_view() {
    let harness = TestHarness::new();
    harness.client.cart().add_item(&product("kettle"), dollars(40), 2);
    harness.client.toggle_favorite(&product("mug")).settled().await;
    harness.cart_api.set_failing(true);
    harness.favorites_api.set_failing(true);

    sign_in(&harness).await;

    // Nothing reached the server, but the local view was not lost.
    assert_eq!(harness.client.cart().count(), 2);
    assert!(harness.client.is_favorite(&product("mug")));
}

#[tokio::test]
async fn test_dropping_the_handle_detaches_the_mirror() {
    let harness = TestHarness::new();
    sign_in(&harness).await;

    // Fire and forget; the spawned mirror still lands.
    drop(harness.client.cart().add_item(&product("kettle"), dollars(40), 1));

    // A subsequent awaited mutation orders us after the first mirror has
    // had a chance to run.
    harness
        .client
        .cart()
        .add_item(&product("mug"), dollars(12), 1)
        .settled()
        .await;
    tokio::task::yield_now().await;

    assert_eq!(harness.client.cart().count(), 2);
    assert_eq!(harness.cart_api.quantity(&product("kettle")), Some(1));
}
