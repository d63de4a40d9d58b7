mod common;

use botherd::store::StateStore;
use botherd::supervisor::{FailurePolicy, ProcessSupervisor};
use botherd::HerdError;
use common::{bot_dir, running_writes, settle, supervisor_config, MockLauncher, PongMode};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_launch_spawns_one_running_handle_per_script() {
    let dir = bot_dir(&["hitbtc", "exmo", "binance"]);
    std::fs::write(dir.path().join("README.md"), "not a worker").unwrap();
    let launcher = MockLauncher::new(PongMode::Echo);
    let store = StateStore::new();

    let supervisor =
        ProcessSupervisor::launch(supervisor_config(dir.path()), store.clone(), launcher.clone())
            .await
            .unwrap();

    let children = supervisor.spawned_children().await;
    assert_eq!(children.len(), 3);
    for id in ["hitbtc", "exmo", "binance"] {
        let handle = &children[id];
        assert!(handle.running);
        assert_eq!(launcher.launch_count(id), 1);
        assert!(store.find_exchange_by_id(id).await.unwrap().running);
    }
}

#[tokio::test]
async fn test_launch_fails_before_any_spawn_on_unreadable_directory() {
    let launcher = MockLauncher::new(PongMode::Echo);
    let config = supervisor_config(&PathBuf::from("/no/such/bot-engines"));

    let result = ProcessSupervisor::launch(config, StateStore::new(), launcher.clone()).await;

    assert!(matches!(result, Err(HerdError::Directory { .. })));
    assert_eq!(launcher.launch_count("hitbtc"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_sends_one_shutdown_and_persists_once() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let store = StateStore::new();
    let supervisor =
        ProcessSupervisor::launch(supervisor_config(dir.path()), store.clone(), launcher.clone())
            .await
            .unwrap();
    let mut events = store.subscribe();

    assert!(supervisor.stop_bot("hitbtc").await);
    assert!(!supervisor.stop_bot("hitbtc").await);

    let channel = launcher.latest("hitbtc");
    assert_eq!(channel.sent_of_type("shutdown").len(), 1);
    assert!(!supervisor.child("hitbtc").await.unwrap().running);
    assert!(!store.find_exchange_by_id("hitbtc").await.unwrap().running);
    assert_eq!(running_writes(&mut events, "hitbtc"), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn test_start_replaces_stopped_handle() {
    let dir = bot_dir(&["exmo"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let store = StateStore::new();
    let supervisor =
        ProcessSupervisor::launch(supervisor_config(dir.path()), store.clone(), launcher.clone())
            .await
            .unwrap();
    let first = supervisor.child("exmo").await.unwrap();
    supervisor.stop_bot("exmo").await;
    let mut events = store.subscribe();

    assert!(supervisor.start_bot("exmo").await.unwrap());

    let second = supervisor.child("exmo").await.unwrap();
    assert!(second.running);
    assert!(second.generation > first.generation);
    assert_eq!(launcher.launch_count("exmo"), 2);
    assert_eq!(running_writes(&mut events, "exmo"), vec![true]);

    // Running and unknown ids are left alone
    assert!(!supervisor.start_bot("exmo").await.unwrap());
    assert!(!supervisor.start_bot("kraken").await.unwrap());
    assert_eq!(launcher.launch_count("exmo"), 2);
    assert!(running_writes(&mut events, "exmo").is_empty());
    assert_eq!(
        supervisor.child("exmo").await.unwrap().generation,
        second.generation
    );
}

#[tokio::test(start_paused = true)]
async fn test_restart_runs_again_after_delay() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let supervisor = ProcessSupervisor::launch(
        supervisor_config(dir.path()),
        StateStore::new(),
        launcher.clone(),
    )
    .await
    .unwrap();
    let first = supervisor.child("hitbtc").await.unwrap();

    assert!(supervisor.restart_bot("hitbtc").await);
    assert!(!supervisor.child("hitbtc").await.unwrap().running);
    assert_eq!(launcher.latest("hitbtc").sent_of_type("shutdown").len(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!supervisor.child("hitbtc").await.unwrap().running);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    settle().await;
    let restarted = supervisor.child("hitbtc").await.unwrap();
    assert!(restarted.running);
    assert!(restarted.generation > first.generation);
    assert_eq!(launcher.launch_count("hitbtc"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_during_restart_window_wins() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let supervisor = ProcessSupervisor::launch(
        supervisor_config(dir.path()),
        StateStore::new(),
        launcher.clone(),
    )
    .await
    .unwrap();

    supervisor.restart_bot("hitbtc").await;
    assert!(supervisor.start_bot("hitbtc").await.unwrap());
    let started = supervisor.child("hitbtc").await.unwrap();

    tokio::time::sleep(Duration::from_millis(3000)).await;
    settle().await;

    let current = supervisor.child("hitbtc").await.unwrap();
    assert!(current.running);
    assert_eq!(current.generation, started.generation);
    assert_eq!(launcher.launch_count("hitbtc"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_restart_window_cancels_restart() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let supervisor = ProcessSupervisor::launch(
        supervisor_config(dir.path()),
        StateStore::new(),
        launcher.clone(),
    )
    .await
    .unwrap();

    supervisor.restart_bot("hitbtc").await;
    assert!(!supervisor.stop_bot("hitbtc").await);

    tokio::time::sleep(Duration::from_millis(3000)).await;
    settle().await;

    assert!(!supervisor.child("hitbtc").await.unwrap().running);
    assert_eq!(launcher.launch_count("hitbtc"), 1);
    let summaries = supervisor.summaries().await;
    assert!(!summaries[0].restart_pending);
}

#[tokio::test(start_paused = true)]
async fn test_restart_policy_relaunches_unresponsive_worker() {
    let dir = bot_dir(&["exmo"]);
    let launcher = MockLauncher::new(PongMode::Silent);
    let mut config = supervisor_config(dir.path());
    config.failure_policy = FailurePolicy::Restart;
    let supervisor = ProcessSupervisor::launch(config, StateStore::new(), launcher.clone())
        .await
        .unwrap();
    let first = supervisor.child("exmo").await.unwrap();
    launcher.set_mode(PongMode::Echo);

    // Ping at 2s, deadline at 7s, relaunch at 9s
    tokio::time::sleep(Duration::from_millis(8000)).await;
    settle().await;
    assert!(!supervisor.child("exmo").await.unwrap().running);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;
    let relaunched = supervisor.child("exmo").await.unwrap();
    assert!(relaunched.running);
    assert!(relaunched.generation > first.generation);
    assert_eq!(launcher.launch_count("exmo"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_send_to_bot_forwards_payload() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let supervisor = ProcessSupervisor::launch(
        supervisor_config(dir.path()),
        StateStore::new(),
        launcher.clone(),
    )
    .await
    .unwrap();

    let toggle = json!({"type": "set_markets", "data": {"ETH_BTC": false}});
    supervisor.send_to_bot("hitbtc", toggle.clone()).await.unwrap();
    assert_eq!(launcher.latest("hitbtc").sent_of_type("set_markets"), vec![toggle]);

    launcher.latest("hitbtc").close();
    assert!(matches!(
        supervisor.send_to_bot("hitbtc", json!({"type": "noop"})).await,
        Err(HerdError::ChannelClosed(_))
    ));

    supervisor.stop_bot("hitbtc").await;
    assert!(matches!(
        supervisor.send_to_bot("hitbtc", json!({"type": "noop"})).await,
        Err(HerdError::WorkerNotRunning(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_worker_messages_reach_store_and_subscribers() {
    let dir = bot_dir(&["hitbtc"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let store = StateStore::new();
    let supervisor =
        ProcessSupervisor::launch(supervisor_config(dir.path()), store.clone(), launcher.clone())
            .await
            .unwrap();
    let mut published = supervisor.subscribe();

    let balance = json!({
        "type": "balance",
        "exchange": "hitbtc",
        "data": [{"currency": "BTC", "available": "0.05046", "reserved": "0"}]
    });
    let channel = launcher.latest("hitbtc");
    channel.emit(json!({"type": "pong", "data": 99})).await;
    channel.emit(balance.clone()).await;
    settle().await;

    assert_eq!(published.recv().await.unwrap(), balance);
    assert!(published.try_recv().is_err());

    let record = store.find_exchange_by_id("hitbtc").await.unwrap();
    assert_eq!(record.balances.len(), 1);
    assert_eq!(record.balances[0].currency, "BTC");
    assert!(record.running);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_every_running_worker() {
    let dir = bot_dir(&["hitbtc", "exmo"]);
    let launcher = MockLauncher::new(PongMode::Echo);
    let supervisor = ProcessSupervisor::launch(
        supervisor_config(dir.path()),
        StateStore::new(),
        launcher.clone(),
    )
    .await
    .unwrap();
    supervisor.stop_bot("exmo").await;

    assert_eq!(supervisor.shutdown().await, 1);
    assert!(supervisor
        .spawned_children()
        .await
        .values()
        .all(|handle| !handle.running));
    assert_eq!(launcher.latest("exmo").sent_of_type("shutdown").len(), 1);
}
