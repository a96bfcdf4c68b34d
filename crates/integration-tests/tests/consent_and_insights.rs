//! Consent gating and derived insights through the facade.

#![allow(clippy::unwrap_used)]

use cloudberry_client::activity::ActivityKind;
use cloudberry_client::consent::{ConsentDecision, ConsentRecord};
use cloudberry_client::store::PartitionKey;
use cloudberry_integration_tests::TestHarness;
use serde_json::json;

#[tokio::test]
async fn test_tracking_is_refused_until_consent_is_granted() {
    let harness = TestHarness::new();
    let client = &harness.client;
    assert_eq!(client.get_consent(), ConsentDecision::Unset);

    for _ in 0..10 {
        client.track_activity(ActivityKind::PageView, json!({"page": "/"}));
    }
    assert_eq!(client.get_insights().total_events, 0);

    client.set_consent(ConsentRecord::accept_all());
    // No backfill; only events after the grant are recorded.
    assert_eq!(client.get_insights().total_events, 0);

    client.track_activity(ActivityKind::PageView, json!({"page": "/"}));
    assert_eq!(client.get_insights().total_events, 1);
}

#[tokio::test]
async fn test_declined_consent_is_still_persisted() {
    let harness = TestHarness::new();
    harness.client.set_consent(ConsentRecord::decline_all());

    // The record itself travels through the capped channel even when
    // everything revocable is off.
    use cloudberry_client::store::PersistenceChannel;
    let raw = harness.channel.read(&PartitionKey::consent().render());
    assert!(raw.is_some());
    assert!(raw.unwrap().contains("\"accepted\":false"));
}

#[tokio::test]
async fn test_consent_decision_survives_a_restart() {
    let first = TestHarness::new();
    first
        .client
        .set_consent(ConsentRecord::decided(true, true, false, false));

    let second = TestHarness::over_channel(first.channel);
    match second.client.get_consent() {
        ConsentDecision::Decided(record) => {
            assert!(record.analytics);
            assert!(!record.marketing);
        }
        ConsentDecision::Unset => panic!("expected the persisted decision"),
    }

    // The restored gate enforces the persisted categories.
    second
        .client
        .track_activity(ActivityKind::Search, json!({"query": "tea"}));
    assert_eq!(second.client.get_insights().total_events, 1);
}

#[tokio::test]
async fn test_revoking_consent_stops_tracking_but_keeps_history() {
    let harness = TestHarness::new();
    let client = &harness.client;
    client.set_consent(ConsentRecord::accept_all());

    client.track_activity(ActivityKind::View, json!({}));
    client.track_activity(ActivityKind::View, json!({}));
    assert_eq!(client.get_insights().total_events, 2);

    client.set_consent(ConsentRecord::decline_all());
    client.track_activity(ActivityKind::View, json!({}));
    assert_eq!(client.get_insights().total_events, 2);
}

#[tokio::test]
async fn test_insights_report_engagement_and_top_pages() {
    let harness = TestHarness::new();
    let client = &harness.client;
    client.set_consent(ConsentRecord::accept_all());

    client.track_activity(ActivityKind::PageView, json!({"page": "/teapots"}));
    client.track_activity(ActivityKind::PageView, json!({"page": "/teapots"}));
    client.track_activity(ActivityKind::PageView, json!({"page": "/mugs"}));
    client.track_activity(ActivityKind::AddToCart, json!({"product": "mug"}));

    let insights = client.get_insights();
    assert_eq!(insights.total_events, 4);
    // 3 engagement events out of 4.
    assert_eq!(insights.engagement_score, 75);
    assert_eq!(insights.most_visited[0], ("/teapots".to_string(), 2));
    assert_eq!(insights.most_visited[1], ("/mugs".to_string(), 1));
}

#[tokio::test]
async fn test_cart_activity_is_recorded_only_with_consent() {
    use cloudberry_core::ProductRef;
    use cloudberry_integration_tests::dollars;

    let harness = TestHarness::new();
    let client = &harness.client;
    let kettle = ProductRef::parse("kettle").unwrap();

    // Mutations work regardless of consent; only the tracking is gated.
    client.cart().add_item(&kettle, dollars(40), 1);
    assert_eq!(client.cart().count(), 1);
    assert_eq!(client.get_insights().total_events, 0);

    client.set_consent(ConsentRecord::accept_all());
    client.cart().add_item(&kettle, dollars(40), 1);
    assert_eq!(client.get_insights().total_events, 1);
}
