mod common;

use common::{CountingIdentity, RecordingNavigator};
use std::{sync::Arc, time::Duration};
use storefront_guard::{
    RedirectQueue,
    idle::{ActivityOutcome, IdleMonitor, IdleMonitors, MonitorState},
    navigation::Navigator,
};
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(30 * 60);
const LOGIN: &str = "/login.html?notice=session-expired";

// Lets the expiry task finish its sign-out and redirect.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn harness(identity: CountingIdentity) -> (Arc<CountingIdentity>, Arc<RecordingNavigator>) {
    (Arc::new(identity), Arc::new(RecordingNavigator::default()))
}

#[tokio::test(start_paused = true)]
async fn test_activity_within_timeout_never_signs_out() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitor = IdleMonitor::start(Uuid::new_v4(), TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    for _ in 0..10 {
        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        settle().await;
        assert!(monitor.rearm().is_some());
    }

    assert_eq!(identity.sign_out_count(), 0);
    assert_eq!(navigator.count(), 0);
    assert_eq!(monitor.state(), MonitorState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_gap_of_timeout_signs_out_exactly_once() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let principal = Uuid::new_v4();
    let monitor = IdleMonitor::start(principal, TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    tokio::time::sleep(TIMEOUT).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(monitor.state(), MonitorState::Expired);
    assert_eq!(
        navigator.redirects.lock().as_slice(),
        &[(principal, LOGIN.to_string())]
    );

    // Expired is terminal: nothing rearms and nothing fires again.
    assert!(monitor.rearm().is_none());
    tokio::time::sleep(TIMEOUT * 4).await;
    settle().await;
    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(navigator.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_rearm_leaves_a_single_pending_expiry() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitor = IdleMonitor::start(Uuid::new_v4(), TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    let mut last = None;
    for _ in 0..100 {
        last = monitor.rearm();
    }
    assert_eq!(monitor.deadline(), last);

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(navigator.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_sign_out_still_redirects() {
    let (identity, navigator) = harness(CountingIdentity::failing());
    let monitor = IdleMonitor::start(Uuid::new_v4(), TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(navigator.count(), 1);
    assert_eq!(monitor.state(), MonitorState::Expired);
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_expiry() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitor = IdleMonitor::start(Uuid::new_v4(), TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    monitor.stop();
    tokio::time::sleep(TIMEOUT * 2).await;
    settle().await;

    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(monitor.rearm().is_none());
    assert_eq!(identity.sign_out_count(), 0);
    assert_eq!(navigator.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_monitor_cancels_pending_expiry() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitor = IdleMonitor::start(Uuid::new_v4(), TIMEOUT, identity.clone(), navigator.clone(), LOGIN);

    drop(monitor);
    tokio::time::sleep(TIMEOUT * 2).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 0);
}

// --- Registry ---

#[tokio::test(start_paused = true)]
async fn test_new_page_load_replaces_the_previous_cycle() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitors = IdleMonitors::new(TIMEOUT, LOGIN, identity.clone(), navigator.clone());
    let principal = Uuid::new_v4();

    let first = monitors.begin_page(principal);
    tokio::time::sleep(Duration::from_secs(60)).await;
    let second = monitors.begin_page(principal);

    assert_eq!(first.state(), MonitorState::Stopped);
    assert_eq!(second.state(), MonitorState::Active);

    tokio::time::sleep(TIMEOUT * 2).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(second.state(), MonitorState::Expired);
    assert_eq!(monitors.state(principal), None);
}

#[tokio::test(start_paused = true)]
async fn test_expired_monitor_leaves_registry_even_if_sign_out_fails() {
    let (identity, navigator) = harness(CountingIdentity::failing());
    let monitors = IdleMonitors::new(TIMEOUT, LOGIN, identity.clone(), navigator.clone());
    let principal = Uuid::new_v4();

    let monitor = monitors.begin_page(principal);
    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(identity.sign_out_count(), 1);
    assert_eq!(navigator.count(), 1);
    assert_eq!(monitor.state(), MonitorState::Expired);
    assert_eq!(monitors.state(principal), None);
    assert!(!monitors.stop(principal));
}

#[tokio::test(start_paused = true)]
async fn test_record_activity_outcomes() {
    let (identity, navigator) = harness(CountingIdentity::default());
    let monitors = IdleMonitors::new(TIMEOUT, LOGIN, identity.clone(), navigator.clone());
    let principal = Uuid::new_v4();

    assert_eq!(monitors.record_activity(principal), ActivityOutcome::NotMonitored);

    monitors.begin_page(principal);
    assert!(matches!(
        monitors.record_activity(principal),
        ActivityOutcome::Rearmed { .. }
    ));

    assert!(monitors.stop(principal));
    assert!(!monitors.stop(principal));
    assert_eq!(monitors.record_activity(principal), ActivityOutcome::NotMonitored);

    monitors.begin_page(principal);
    tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
    settle().await;
    // Expired cycles are forgotten.
    assert_eq!(monitors.record_activity(principal), ActivityOutcome::NotMonitored);
    assert_eq!(monitors.login_url(), LOGIN);
}

// --- Redirect queue ---

#[tokio::test(start_paused = true)]
async fn test_redirect_queue_routes_cleared_sessions_to_pending_redirect() {
    let queue = RedirectQueue::new();
    let (principal, other) = (Uuid::new_v4(), Uuid::new_v4());
    let (session_a, session_b) = (Uuid::new_v4(), Uuid::new_v4());

    // Nothing pending: binding is ignored.
    queue.bind_sessions(other, &[session_b]);
    assert_eq!(queue.take_for_session(session_b), None);

    queue.redirect(principal, LOGIN);
    queue.bind_sessions(principal, &[session_a, session_b]);

    assert_eq!(queue.take_for_session(session_a).as_deref(), Some(LOGIN));
    assert!(!queue.is_pending(principal));
    assert_eq!(queue.take_for_session(session_b), None);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_queue_drops_unclaimed_entries_after_retention() {
    let queue = RedirectQueue::with_retention(Duration::from_secs(60));
    let (stale, fresh) = (Uuid::new_v4(), Uuid::new_v4());

    queue.redirect(stale, LOGIN);
    tokio::time::sleep(Duration::from_secs(61)).await;
    queue.redirect(fresh, LOGIN);

    assert!(!queue.is_pending(stale));
    assert!(queue.is_pending(fresh));
    assert_eq!(queue.len(), 1);
}
