//! Durability quorum tests
//!
//! Exercise the coordinator end to end over a scripted cluster where each
//! node's key state is controlled by the test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aerodb_client::config::DurabilityConfig;
use aerodb_client::durability::{DurabilityCoordinator, PersistTo, ReplicateTo};
use aerodb_client::observability::ClientMetrics;
use aerodb_client::routing::{ClusterTopology, NodeInfo, NodeLocator, PartitionEntry, Service};
use aerodb_client::transport::mock::{self, ScriptedTransport};
use aerodb_client::transport::{Request, TransportError};
use aerodb_client::ClientError;

const FOUND_NOT_PERSISTED: u8 = 0x00;
const FOUND_PERSISTED: u8 = 0x01;

/// Master on node 0, replicas on nodes 1..=replicas for every partition
fn locator(replicas: usize) -> Arc<NodeLocator> {
    let nodes: Vec<NodeInfo> = (0..=replicas)
        .map(|i| NodeInfo::new(format!("n{}", i), 11210, vec![Service::Kv]))
        .collect();
    let server_list = nodes.iter().map(NodeInfo::address).collect();
    let partitions = vec![
        PartitionEntry {
            master: 0,
            replicas: (1..=replicas as i16).collect(),
        };
        64
    ];
    Arc::new(NodeLocator::new(
        ClusterTopology::partitioned(1, nodes, server_list, partitions, replicas).unwrap(),
    ))
}

/// Node address -> key state reported by that node
type KeyStates = Arc<Mutex<HashMap<String, u8>>>;

fn scripted_cluster(states: KeyStates) -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new(move |req| match req {
        Request::Observe(probe) => {
            let state = states
                .lock()
                .unwrap()
                .get(&probe.node)
                .copied()
                .unwrap_or(FOUND_NOT_PERSISTED);
            Ok(mock::observe(state, probe.is_master()))
        }
        other => panic!("unexpected request {:?}", other),
    }))
}

fn coordinator(
    transport: Arc<ScriptedTransport>,
    replicas: usize,
) -> (DurabilityCoordinator, Arc<ClientMetrics>) {
    let metrics = Arc::new(ClientMetrics::new());
    let coordinator = DurabilityCoordinator::new(
        transport,
        locator(replicas),
        Arc::clone(&metrics),
        &DurabilityConfig { poll_interval_ms: 5 },
    );
    (coordinator, metrics)
}

// =============================================================================
// QUORUM
// =============================================================================

#[tokio::test]
async fn test_master_persisted_satisfies_persist_master() {
    let states: KeyStates = Arc::new(Mutex::new(HashMap::from([
        ("n0:11210".to_string(), FOUND_PERSISTED),
    ])));
    let transport = scripted_cluster(states);
    let (coord, _) = coordinator(Arc::clone(&transport), 2);

    coord
        .await_durability("doc", 42, false, PersistTo::Master, ReplicateTo::None, Duration::from_secs(1))
        .await
        .unwrap();

    // PersistTo::Master never needs a replica probe
    assert_eq!(transport.observe_count(), 1);
}

#[tokio::test]
async fn test_persist_two_waits_for_a_replica() {
    let states: KeyStates = Arc::new(Mutex::new(HashMap::from([
        ("n0:11210".to_string(), FOUND_PERSISTED),
    ])));
    let transport = scripted_cluster(Arc::clone(&states));
    let (coord, metrics) = coordinator(Arc::clone(&transport), 2);

    let flip = {
        let states = Arc::clone(&states);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            states
                .lock()
                .unwrap()
                .insert("n2:11210".to_string(), FOUND_PERSISTED);
        })
    };

    coord
        .await_durability("doc", 42, false, PersistTo::Two, ReplicateTo::None, Duration::from_secs(2))
        .await
        .unwrap();
    flip.await.unwrap();

    assert!(metrics.snapshot().observe_polls > 1);
    // Every round probes the master and both replicas
    assert_eq!(transport.observe_count() as u64, metrics.snapshot().observe_polls * 3);
}

#[tokio::test]
async fn test_replicate_and_persist_both_required() {
    let states: KeyStates = Arc::new(Mutex::new(HashMap::from([
        ("n0:11210".to_string(), FOUND_PERSISTED),
        ("n1:11210".to_string(), FOUND_NOT_PERSISTED),
        ("n2:11210".to_string(), FOUND_NOT_PERSISTED),
    ])));
    let (coord, _) = coordinator(scripted_cluster(states), 2);

    coord
        .await_durability("doc", 1, false, PersistTo::One, ReplicateTo::Two, Duration::from_secs(1))
        .await
        .unwrap();
}

// =============================================================================
// FAILURE MODES
// =============================================================================

#[tokio::test]
async fn test_timeout_within_bounded_margin() {
    let states: KeyStates = Arc::new(Mutex::new(HashMap::new()));
    let (coord, metrics) = coordinator(scripted_cluster(states), 1);

    let started = Instant::now();
    let err = coord
        .await_durability("doc", 1, false, PersistTo::Master, ReplicateTo::None, Duration::from_millis(50))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ClientError::DurabilityTimeout { .. }), "got {:?}", err);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);
    assert_eq!(metrics.snapshot().durability_timeouts, 1);
}

#[tokio::test]
async fn test_node_failure_is_not_a_timeout() {
    let transport = Arc::new(ScriptedTransport::new(|req| match req {
        Request::Observe(probe) if probe.is_master() => Ok(mock::observe(FOUND_PERSISTED, true)),
        _ => Err(TransportError::io("connection reset by peer")),
    }));
    let (coord, metrics) = coordinator(transport, 1);

    let err = coord
        .await_durability("doc", 1, false, PersistTo::One, ReplicateTo::One, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::DurabilityFailed { .. }), "got {:?}", err);
    assert!(err.transport().is_some());
    assert_eq!(metrics.snapshot().durability_failures, 1);
    assert_eq!(metrics.snapshot().durability_timeouts, 0);
}

#[tokio::test]
async fn test_unconfigured_replica_fails_before_polling() {
    let transport = scripted_cluster(Arc::new(Mutex::new(HashMap::new())));
    let (coord, _) = coordinator(Arc::clone(&transport), 1);

    let err = coord
        .await_durability("doc", 1, false, PersistTo::None, ReplicateTo::Three, Duration::from_secs(1))
        .await
        .unwrap_err();

    match err {
        ClientError::DurabilityFailed { source, .. } => {
            assert!(matches!(*source, ClientError::Routing(_)), "got {:?}", source)
        }
        other => panic!("expected DurabilityFailed, got {:?}", other),
    }
    assert_eq!(transport.observe_count(), 0);
}
