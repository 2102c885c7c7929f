//! Registry behavior: idempotent open, dispose, diagnostics, shared UI.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_config, AttemptPlan, MockConnector};
use webterm_client::{SessionRegistry, SessionState, UiModel};

fn registry_with(
    connector: Arc<MockConnector>,
) -> (SessionRegistry, Arc<UiModel>) {
    let ui = Arc::new(UiModel::new());
    let registry = SessionRegistry::new(test_config(), connector, ui.clone());
    (registry, ui)
}

#[tokio::test(start_paused = true)]
async fn open_with_id_reattaches_instead_of_duplicating() {
    let (connector, mut accepted) = MockConnector::new([AttemptPlan::Accept]);
    let (registry, _ui) = registry_with(connector.clone());

    let first = registry.open_with_id("term-1", "ws://mock");
    let _server = accepted.recv().await.unwrap();
    first.wait_for_state(SessionState::Connected).await.unwrap();

    // Same id again: same running session, no second dial.
    let second = registry.open_with_id("term-1", "ws://mock");
    assert_eq!(second.id(), "term-1");
    assert_eq!(second.status().state, SessionState::Connected);
    assert_eq!(registry.session_count(), 1);

    common::settle().await;
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn dispose_cancels_pending_retry_and_clears_ui() {
    let (connector, _accepted) = MockConnector::new([AttemptPlan::Refuse]);
    let (registry, ui) = registry_with(connector.clone());

    let handle = registry.open("ws://mock");
    handle
        .wait_for_state(SessionState::Reconnecting)
        .await
        .unwrap();
    let id = handle.id().to_string();
    assert!(ui.tab_class(&id).is_some());

    assert!(registry.dispose(&id));
    common::settle().await;

    assert!(ui.tab_class(&id).is_none(), "tab entry removed on dispose");
    assert!(ui.overlay_hidden());
    assert_eq!(registry.session_count(), 0);

    // The scheduled retry never fires.
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(connector.attempts(), 1);

    // Disposing again is a no-op.
    assert!(!registry.dispose(&id));
}

#[tokio::test(start_paused = true)]
async fn snapshot_reports_per_session_diagnostics() {
    let (connector, mut accepted) =
        MockConnector::new([AttemptPlan::Accept, AttemptPlan::Refuse]);
    let (registry, _ui) = registry_with(connector);

    let a = registry.open_with_id("a", "ws://mock");
    let _server_a = accepted.recv().await.unwrap();
    a.wait_for_state(SessionState::Connected).await.unwrap();

    let b = registry.open_with_id("b", "ws://mock");
    b.wait_for_state(SessionState::Reconnecting).await.unwrap();
    b.input(b"queued ".to_vec()).unwrap();
    b.input(b"keys".to_vec()).unwrap();
    common::settle().await;

    let diags = registry.snapshot();
    assert_eq!(diags.len(), 2);

    assert_eq!(diags[0].id, "a");
    assert_eq!(diags[0].state, SessionState::Connected);
    assert_eq!(diags[0].attempt, 0);
    assert_eq!(diags[0].queued_input, 0);

    assert_eq!(diags[1].id, "b");
    assert_eq!(diags[1].state, SessionState::Reconnecting);
    assert_eq!(diags[1].queued_input, 2);
    assert!(diags[1].generation >= 1);
}

#[tokio::test(start_paused = true)]
async fn overlay_is_shared_across_sessions() {
    let (connector, mut accepted) = MockConnector::new(
        std::iter::once(AttemptPlan::Accept).chain([AttemptPlan::Refuse; 6]),
    );
    let (registry, ui) = registry_with(connector);

    let a = registry.open_with_id("a", "ws://mock");
    let _server_a = accepted.recv().await.unwrap();
    a.wait_for_state(SessionState::Connected).await.unwrap();
    assert!(ui.overlay_hidden());

    // A second session burning through its retries pins the overlay.
    let b = registry.open_with_id("b", "ws://mock");
    b.wait_for_state(SessionState::Failed).await.unwrap();
    assert!(!ui.overlay_hidden());
    assert_eq!(ui.tab_class("b").unwrap(), "terminal-tab failed");
    assert_eq!(ui.tab_class("a").unwrap(), "terminal-tab");
    assert_eq!(a.status().state, SessionState::Connected);

    // Removing the failed session releases it.
    registry.dispose("b");
    common::settle().await;
    assert!(ui.overlay_hidden());
    assert_eq!(registry.session_count(), 1);
}
