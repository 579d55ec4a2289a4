mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockChain, RecordingObserver};
use wallet_core_lib::{
    ConnectionObserver, NetworkConnectionStatus, NetworkManager, WalletResult,
};

fn manager(
    chain: &Arc<MockChain>,
    observer: &Arc<RecordingObserver>,
    polling_interval: Duration,
) -> Arc<NetworkManager> {
    let observer: Arc<dyn ConnectionObserver> = observer.clone();
    NetworkManager::new(
        chain.api(),
        "testnet",
        polling_interval,
        Arc::downgrade(&observer),
    )
}

fn idle_manager(chain: &Arc<MockChain>, observer: &Arc<RecordingObserver>) -> Arc<NetworkManager> {
    manager(chain, observer, Duration::from_secs(3600))
}

#[tokio::test]
async fn reachable_pinned_node_connects_and_arms_the_next_run() {
    let chain = MockChain::new();
    chain.with_node("http://pinned", "testnet");
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, Some("http://pinned".into()));

    manager.run_connection_job().await;

    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connected);
    assert!(manager.is_connection_job_scheduled());
    assert_eq!(
        manager.network_properties().map(|p| p.node_url),
        Some("http://pinned".to_string())
    );
    assert_eq!(*observer.statuses.lock(), vec![NetworkConnectionStatus::Connected]);
    assert!(chain.calls_with_prefix("node_list:").is_empty());

    manager.stop_connection_job();
    assert!(!manager.is_connection_job_scheduled());
}

#[tokio::test]
async fn unreachable_pinned_node_fails_on_the_second_attempt() {
    let chain = MockChain::new();
    chain.with_node("http://healthy", "testnet");
    chain.with_node_list("testnet", &["http://healthy"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, Some("http://dead".into()));

    manager.run_connection_job().await;
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connecting);
    // A pinned node disables auto-selection.
    assert!(chain.calls_with_prefix("ping:").is_empty());

    manager.run_connection_job().await;
    assert_eq!(
        manager.connection_status(),
        NetworkConnectionStatus::FailedCustomNode
    );
    assert!(manager.is_connection_job_scheduled());
    assert_eq!(
        *observer.statuses.lock(),
        vec![
            NetworkConnectionStatus::Connecting,
            NetworkConnectionStatus::FailedCustomNode
        ]
    );
    assert_eq!(
        *observer.node_urls.lock(),
        vec![vec!["http://healthy".to_string()]; 2]
    );
}

#[tokio::test]
async fn failing_node_list_means_no_internet() {
    let chain = MockChain::new();
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);

    manager.run_connection_job().await;

    assert_eq!(manager.connection_status(), NetworkConnectionStatus::NoInternet);
    assert!(manager.is_connection_job_scheduled());
    assert_eq!(chain.calls(), vec!["node_list:testnet".to_string()]);
}

#[tokio::test]
async fn candidates_are_pinged_in_order_until_one_answers() {
    let chain = MockChain::new();
    chain.with_node("http://second", "testnet");
    chain.with_node_list("testnet", &["http://first", "http://second", "http://third"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);

    manager.run_connection_job().await;

    assert_eq!(
        chain.calls_with_prefix("ping:"),
        vec!["ping:http://first".to_string(), "ping:http://second".to_string()]
    );
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connected);
    assert_eq!(
        manager.network_properties().map(|p| p.node_url),
        Some("http://second".to_string())
    );
    assert_eq!(
        *observer.statuses.lock(),
        vec![
            NetworkConnectionStatus::Connecting,
            NetworkConnectionStatus::Connected
        ]
    );
    assert_eq!(manager.node_urls().len(), 3);
}

#[tokio::test]
async fn last_good_node_is_reused_without_the_candidate_list() {
    let chain = MockChain::new();
    chain.with_node("http://node", "testnet");
    chain.with_node_list("testnet", &["http://node"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);

    manager.run_connection_job().await;
    chain.clear_calls();
    manager.run_connection_job().await;

    assert_eq!(chain.calls(), vec!["properties:http://node".to_string()]);
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connected);
}

#[tokio::test]
async fn node_serving_another_network_is_rejected() -> WalletResult<()> {
    let chain = MockChain::new();
    chain.with_node("http://mainnet-node", "mainnet");
    chain.with_node_list("testnet", &["http://mainnet-node"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);

    let err = manager
        .fetch_network_properties("http://mainnet-node")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "API_NETWORK_IDENTIFIER_MISMATCH");

    manager.run_connection_job().await;
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connecting);
    assert!(manager.network_properties().is_none());
    Ok(())
}

#[tokio::test]
async fn chain_listener_follows_the_listen_address() {
    let chain = MockChain::new();
    chain.with_node("http://node", "testnet");
    chain.with_node_list("testnet", &["http://node"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);

    manager.run_connection_job().await;
    assert!(!manager.has_chain_listener());

    manager.set_listen_address(Some("TADDRESS".into())).await;
    assert!(manager.has_chain_listener());
    assert_eq!(chain.active_listeners(), 1);

    manager.set_listen_address(Some("TOTHER".into())).await;
    assert_eq!(chain.active_listeners(), 1);
    assert_eq!(
        chain.calls_with_prefix("listener:"),
        vec!["listener:TADDRESS".to_string(), "listener:TOTHER".to_string()]
    );

    manager.stop_chain_listener();
    manager.stop_chain_listener();
    assert!(!manager.has_chain_listener());
    assert_eq!(chain.active_listeners(), 0);
}

#[tokio::test]
async fn switching_networks_starts_over() {
    let chain = MockChain::new();
    chain.with_node("http://testnet-node", "testnet");
    chain.with_node_list("testnet", &["http://testnet-node"]);
    chain.with_node("http://mainnet-node", "mainnet");
    chain.with_node_list("mainnet", &["http://mainnet-node"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);
    manager.run_connection_job().await;
    manager.set_listen_address(Some("TADDRESS".into())).await;
    assert_eq!(chain.active_listeners(), 1);

    manager.select_network("mainnet", None).await;

    let state = manager.state();
    assert_eq!(state.network_identifier, "mainnet");
    assert_eq!(state.connection_status, NetworkConnectionStatus::Connected);
    assert_eq!(
        state.network_properties.map(|p| p.network_identifier),
        Some("mainnet".to_string())
    );
    assert_eq!(state.listen_address, None);
    assert_eq!(chain.active_listeners(), 0);
}

#[tokio::test]
async fn polling_repeats_until_stopped() {
    let chain = MockChain::new();
    let observer = Arc::new(RecordingObserver::default());
    let manager = manager(&chain, &observer, Duration::from_millis(20));
    manager.init("testnet", None, None);

    manager.start_connection_job().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    let polled = chain.calls_with_prefix("node_list:").len();
    assert!(polled > 1, "only {} runs", polled);

    manager.stop_connection_job();
    assert!(!manager.is_connection_job_scheduled());
    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_stop = chain.calls().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(chain.calls().len(), after_stop);
}

#[tokio::test]
async fn init_resets_status_and_stops_the_job() {
    let chain = MockChain::new();
    chain.with_node("http://node", "testnet");
    chain.with_node_list("testnet", &["http://node"]);
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);
    manager.run_connection_job().await;
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connected);

    manager.init("testnet", None, None);

    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Initial);
    assert!(!manager.is_connection_job_scheduled());
}

#[tokio::test]
async fn refused_listener_reports_an_open_failure() {
    let chain = MockChain::new();
    chain.with_node("http://node", "testnet");
    chain.with_node_list("testnet", &["http://node"]);
    chain.refuse_listeners();
    let observer = Arc::new(RecordingObserver::default());
    let manager = idle_manager(&chain, &observer);
    manager.init("testnet", None, None);
    manager.run_connection_job().await;

    manager.set_listen_address(Some("TADDRESS".into())).await;
    assert_eq!(manager.connection_status(), NetworkConnectionStatus::Connected);
    assert!(!manager.has_chain_listener());

    let err = manager.start_chain_listener().await.unwrap_err();
    assert_eq!(err.code(), "API_LISTENER_OPEN_FAILED");
    assert!(!manager.has_chain_listener());
}
