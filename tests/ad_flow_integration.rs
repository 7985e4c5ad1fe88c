//! End-to-end ad flow: throttle gate, eligibility, display lifecycle, and
//! the fraud actions the lifecycle emits along the way.

use arcade_guard::ads::{
    AdDisplayLifecycle, AdEligibilityEngine, AdError, AdNetworkConfig, AdUnit, DisplayStatus,
    DisplayStore, Placement, store::MemoryAdStore,
};
use arcade_guard::audit::MemoryAuditSink;
use arcade_guard::fraud::{FraudDetector, action};
use arcade_guard::security::RequestThrottle;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

struct Backend {
    throttle: RequestThrottle,
    eligibility: AdEligibilityEngine,
    lifecycle: AdDisplayLifecycle,
    fraud: Arc<FraudDetector>,
    store: Arc<MemoryAdStore>,
    audit: Arc<MemoryAuditSink>,
    mining_unit: AdUnit,
}

async fn backend() -> Backend {
    let store = Arc::new(MemoryAdStore::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let fraud = Arc::new(FraudDetector::new(audit.clone()));

    store
        .set_config(Some(AdNetworkConfig {
            id: 1,
            publisher_id: "pub-555".to_string(),
            is_active: true,
            ad_settings: json!({
                "ad_interval_minutes": 10,
                "ad_protection_seconds": 30
            }),
        }))
        .await;

    let mining_unit = AdUnit {
        id: 10,
        config_id: 1,
        unit_id: "slot-mining-1".to_string(),
        unit_name: "Mining banner".to_string(),
        ad_type: "banner".to_string(),
        placement: Placement::Mining,
        is_active: true,
    };
    store.add_unit(mining_unit.clone()).await;

    Backend {
        throttle: RequestThrottle::default(),
        eligibility: AdEligibilityEngine::new(
            store.clone(),
            store.clone(),
            fraud.clone(),
            audit.clone(),
        ),
        lifecycle: AdDisplayLifecycle::new(store.clone(), store.clone(), fraud.clone(), audit.clone()),
        fraud,
        store,
        audit,
        mining_unit,
    }
}

#[tokio::test]
async fn full_view_click_close_flow() -> anyhow::Result<()> {
    let backend = backend().await;
    let now = Utc::now();

    // Inbound request passes the throttle first
    assert!(backend.throttle.check_request_at("10.0.0.1", now).await.is_allowed());

    // Eligibility grants and hands back the unit + settings
    let grant = backend
        .eligibility
        .can_show_ad_at(Placement::Mining, "sess-1", "10.0.0.1", Some(42), now)
        .await
        .expect("fresh actor should be granted");
    assert_eq!(grant.ad_unit.id, backend.mining_unit.id);

    // Create the protected display; view_ad lands in the fraud history
    let display = backend
        .lifecycle
        .create_at(&grant.ad_unit, "sess-1", "10.0.0.1", "Mozilla/5.0", Some(42), now)
        .await?;
    assert_eq!(backend.fraud.action_count(42, action::VIEW_AD).await, 1);

    // Status mid-protection
    let report = backend
        .lifecycle
        .status_at(display.id, now + Duration::seconds(12))
        .await?;
    assert!(!report.can_close);
    assert_eq!(report.seconds_remaining, 18);

    // An organic click after a few seconds
    backend
        .lifecycle
        .click_at(display.id, "sess-1", "10.0.0.1", now + Duration::seconds(8))
        .await?;
    assert_eq!(backend.fraud.action_count(42, action::CLICK_AD).await, 1);

    // Close once the protection window has elapsed
    let closed = backend
        .lifecycle
        .close_at(display.id, "sess-1", "10.0.0.1", now + Duration::seconds(31))
        .await?;
    assert_eq!(closed.status, DisplayStatus::Closed);
    assert!(closed.was_clicked);
    assert_eq!(backend.fraud.action_count(42, action::CLOSE_AD).await, 1);

    // The lifecycle audit trail is complete
    assert_eq!(backend.audit.count_of("ad_display_created"), 1);
    assert_eq!(backend.audit.count_of("ad_clicked_safely"), 1);
    assert_eq!(backend.audit.count_of("ad_closed_safely"), 1);

    Ok(())
}

#[tokio::test]
async fn interval_blocks_immediate_repeat_then_releases() -> anyhow::Result<()> {
    let backend = backend().await;
    let now = Utc::now();

    let grant = backend
        .eligibility
        .can_show_ad_at(Placement::Mining, "sess-1", "10.0.0.1", None, now)
        .await
        .expect("first request granted");
    backend
        .lifecycle
        .create_at(&grant.ad_unit, "sess-1", "10.0.0.1", "", None, now)
        .await?;

    // One second later the same session is inside the interval
    let err = backend
        .eligibility
        .can_show_ad_at(Placement::Mining, "sess-1", "10.0.0.1", None, now + Duration::seconds(1))
        .await
        .unwrap_err();
    match err {
        AdError::IntervalNotElapsed {
            seconds_remaining, ..
        } => assert_eq!(seconds_remaining, 599),
        other => panic!("expected interval denial, got {other:?}"),
    }

    // At the ten-minute mark the window releases
    assert!(
        backend
            .eligibility
            .can_show_ad_at(
                Placement::Mining,
                "sess-1",
                "10.0.0.1",
                None,
                now + Duration::minutes(10)
            )
            .await
            .is_ok()
    );

    Ok(())
}

#[tokio::test]
async fn fraud_hold_follows_bot_behavior() -> anyhow::Result<()> {
    let backend = backend().await;
    let now = Utc::now();
    let player = 77;

    // A clean player is granted, sees an ad, and clicks it instantly: the
    // sub-2s click lands as a bot signal in the fraud history
    let grant = backend
        .eligibility
        .can_show_ad_at(Placement::Mining, "sess-1", "10.0.0.1", Some(player), now)
        .await
        .expect("clean player granted");
    let display = backend
        .lifecycle
        .create_at(&grant.ad_unit, "sess-1", "10.0.0.1", "", Some(player), now)
        .await?;
    backend
        .lifecycle
        .click_at(display.id, "sess-1", "10.0.0.1", now + Duration::seconds(1))
        .await?;
    assert_eq!(
        backend.fraud.action_count(player, action::SUSPICIOUS_AD_CLICK).await,
        1
    );

    // The same player then spams game actions at machine cadence
    for i in 0..20 {
        backend
            .fraud
            .record_action_at(
                player,
                "kill_monster",
                json!({}),
                now + Duration::seconds(2) + Duration::milliseconds(i * 50),
            )
            .await;
    }

    // Once the pacing interval has released, eligibility still holds the
    // player - even from a fresh session and IP
    let later = now + Duration::minutes(10);
    let err = backend
        .eligibility
        .can_show_ad_at(Placement::Mining, "sess-new", "10.9.9.9", Some(player), later)
        .await
        .unwrap_err();
    match err {
        AdError::HighFraudScore { score } => assert!(score > 80),
        other => panic!("expected fraud hold, got {other:?}"),
    }

    // Anonymous traffic is not held
    assert!(
        backend
            .eligibility
            .can_show_ad_at(Placement::Mining, "sess-anon", "10.9.9.8", None, later)
            .await
            .is_ok()
    );

    Ok(())
}

#[tokio::test]
async fn throttle_shields_the_ad_endpoint() {
    let backend = backend().await;
    let now = Utc::now();

    // An IP hammering the endpoint gets cut off after 10 requests,
    // before eligibility is ever consulted
    let mut allowed = 0;
    for _ in 0..25 {
        if backend.throttle.check_request_at("203.0.113.9", now).await.is_allowed() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);

    // The block holds for the full five minutes
    let decision = backend
        .throttle
        .check_request_at("203.0.113.9", now + Duration::seconds(299))
        .await;
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn analytics_reflects_lifecycle_outcomes() -> anyhow::Result<()> {
    let backend = backend().await;
    let now = Utc::now();
    let start = now - Duration::minutes(5);

    for i in 0..4 {
        let session = format!("sess-{i}");
        let ip = format!("10.0.1.{i}");
        let grant = backend
            .eligibility
            .can_show_ad_at(Placement::Mining, &session, &ip, None, now)
            .await
            .expect("distinct actors granted");
        let display = backend
            .lifecycle
            .create_at(&grant.ad_unit, &session, &ip, "", None, now)
            .await?;

        if i % 2 == 0 {
            backend
                .lifecycle
                .click_at(display.id, &session, &ip, now + Duration::seconds(5))
                .await?;
        }
    }

    let analytics = backend
        .lifecycle
        .analytics(start, now + Duration::minutes(5))
        .await?;
    assert_eq!(analytics.total_displays, 4);
    assert_eq!(analytics.total_clicks, 2);
    assert_eq!(analytics.total_closed, 0);
    assert!((analytics.ctr - 50.0).abs() < f64::EPSILON);
    assert_eq!(analytics.by_placement[&Placement::Mining].displays, 4);

    // Sanity: the store still serves each record individually
    let listed = backend
        .store
        .list_between(start, now + Duration::minutes(5))
        .await
        .unwrap();
    assert_eq!(listed.len(), 4);

    Ok(())
}
