use super::*;

#[tokio::test]
#[serial]
async fn test_cancel_before_start_processes_zero_items() {
    let (session, dest, _temp_dir) = create_test_session();
    let mut rx = session.subscribe();

    session.cancel();
    let summary = session
        .start(requests(&["https://youtu.be/early1"]), options(&dest))
        .await
        .unwrap();

    assert_eq!(summary.items_succeeded, 0);
    assert_eq!(summary.items_failed, 0);
    assert_eq!(summary.items_cancelled, 0);
    assert!(summary.cancelled);
    assert!(!session.is_running());
    // The stale flag survives the run
    assert!(session.is_cancel_requested());

    let events = drain(&mut rx);
    assert!(matches!(
        events.as_slice(),
        [
            Event::CancelRequested,
            Event::BatchStarted { requests: 1 },
            Event::BatchComplete { .. }
        ]
    ));
}

#[tokio::test]
#[serial]
async fn test_reset_cancel_flag_lets_next_run_proceed() {
    let (session, dest, _temp_dir) = create_test_session();

    session.cancel();
    session.reset_cancel_flag();
    assert!(!session.is_cancel_requested());

    let summary = session
        .start(requests(&["https://youtu.be/after1"]), options(&dest))
        .await
        .unwrap();
    assert_eq!(summary.items_succeeded, 1);
    assert!(!summary.cancelled);
}

#[tokio::test]
#[serial]
async fn test_cancel_without_run_is_idempotent() {
    let (session, _dest, _temp_dir) = create_test_session();
    let mut rx = session.subscribe();

    session.request_cancel();
    session.request_cancel();
    session.cancel();

    let state = session.state();
    assert!(state.cancel_requested);
    assert!(!state.is_running);
    assert_eq!(state.current_pid, None);
    // Only `cancel` emits
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
#[serial]
async fn test_cancel_terminates_running_fetcher() {
    let (session, dest, _temp_dir) = create_test_session();
    let mut rx = session.subscribe();

    let started = Instant::now();
    let handle = spawn_start(
        &session,
        requests(&["https://youtu.be/slow2", "https://youtu.be/never1"]),
        &dest,
    );
    wait_for_fetcher(&session).await;

    session.cancel();
    let summary = handle.await.unwrap().unwrap();

    // The fake fetcher sleeps for 30 seconds unless terminated
    assert!(started.elapsed() < Duration::from_secs(15));
    assert!(summary.cancelled);
    assert_eq!(summary.items_cancelled, 1);
    assert_eq!(summary.items_succeeded, 0);
    assert_eq!(session.state().current_pid, None);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ItemCompleted { url, cancelled: true } if url.ends_with("slow2")
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::ItemStarted { url, .. } if url.ends_with("never1")
    )));
}
