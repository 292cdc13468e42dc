//! Prepared statement protocol tests
//!
//! Drive the query executor against a scripted transport and check the
//! PREPARE/EXECUTE traffic it produces:
//! 1. Plan cache bounds and recency
//! 2. Ad-hoc bypass
//! 3. Stale plan retry, bounded to one extra round
//! 4. End-to-end prepared execution

use std::sync::Arc;

use serde_json::{json, Value};

use aerodb_client::config::QueryConfig;
use aerodb_client::observability::ClientMetrics;
use aerodb_client::query::{
    PreparedPlan, PreparedPlanCache, QueryExecutor, QueryRequest, INDEX_NOT_FOUND_MARKER,
    INTERNAL_ERROR, PREPARED_NOT_FOUND, PREPARED_STALE,
};
use aerodb_client::routing::{ClusterTopology, NodeInfo, NodeLocator, Service};
use aerodb_client::transport::mock::{self, ScriptedTransport};
use aerodb_client::transport::{Request, Response, TransportResult};

fn locator() -> Arc<NodeLocator> {
    let topology = ClusterTopology::ketama(
        1,
        vec![NodeInfo::new("q1", 11210, vec![Service::Kv, Service::Query])],
    )
    .unwrap();
    Arc::new(NodeLocator::new(topology))
}

struct Harness {
    transport: Arc<ScriptedTransport>,
    cache: Arc<PreparedPlanCache>,
    metrics: Arc<ClientMetrics>,
    executor: QueryExecutor,
}

fn harness<F>(handler: F) -> Harness
where
    F: Fn(&Request) -> TransportResult<Response> + Send + Sync + 'static,
{
    let transport = Arc::new(ScriptedTransport::new(handler));
    let metrics = Arc::new(ClientMetrics::new());
    let cache = Arc::new(PreparedPlanCache::with_metrics(16, Arc::clone(&metrics)));
    let executor = QueryExecutor::new(
        "travel",
        transport.clone(),
        locator(),
        Arc::clone(&cache),
        Arc::clone(&metrics),
        &QueryConfig::default(),
    );
    Harness {
        transport,
        cache,
        metrics,
        executor,
    }
}

fn prepared_name(request: &Request) -> Option<String> {
    request
        .as_query()
        .and_then(|frame| frame.prepared_name())
        .map(str::to_string)
}

fn is_prepare(request: &Request) -> bool {
    request.as_query().map_or(false, |frame| frame.is_prepare())
}

// =============================================================================
// PLAN CACHE
// =============================================================================

#[test]
fn test_cache_evicts_least_recently_used() {
    let cache = PreparedPlanCache::new(2);
    cache.put("a", PreparedPlan::new("a", "pa", None));
    cache.put("b", PreparedPlan::new("b", "pb", None));

    // Touch "a" so "b" becomes the eviction candidate
    assert!(cache.get("a").is_some());
    let evicted = cache.put("c", PreparedPlan::new("c", "pc", None));

    assert_eq!(evicted.as_deref(), Some("b"));
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("a"));
    assert!(cache.contains("c"));
    assert!(!cache.contains("b"));
}

#[test]
fn test_cache_never_exceeds_capacity() {
    let cache = PreparedPlanCache::new(3);
    for i in 0..50 {
        cache.put(format!("s{}", i), PreparedPlan::new(format!("s{}", i), format!("p{}", i), None));
        assert!(cache.len() <= 3);
    }
    assert!(cache.contains("s49"));
    assert!(!cache.contains("s0"));
}

#[test]
fn test_cache_replace_keeps_size() {
    let cache = PreparedPlanCache::new(2);
    cache.put("a", PreparedPlan::new("a", "old", None));
    assert_eq!(cache.put("a", PreparedPlan::new("a", "new", None)), None);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek("a").unwrap().name, "new");
}

// =============================================================================
// AD-HOC
// =============================================================================

#[tokio::test]
async fn test_adhoc_never_prepares() {
    let h = harness(|_| Ok(mock::query_success(&[json!({"$1": 1})])));

    for _ in 0..3 {
        let result = h.executor.query(QueryRequest::new("SELECT 1")).await.unwrap();
        assert!(result.final_success);
    }

    assert_eq!(h.transport.prepare_count(), 0);
    assert_eq!(h.transport.adhoc_count(), 3);
    assert!(h.cache.is_empty());
}

// =============================================================================
// STALE PLAN RETRY
// =============================================================================

#[tokio::test]
async fn test_stale_cached_plan_is_reprepared_once() {
    let h = harness(|req| {
        if is_prepare(req) {
            return Ok(mock::prepared("fresh", Some("plan-v2")));
        }
        match prepared_name(req).as_deref() {
            Some("stale") => Ok(mock::query_error(PREPARED_NOT_FOUND, "no such prepared statement")),
            _ => Ok(mock::query_success(&[json!({"n": 1})])),
        }
    });
    h.cache.put(
        "SELECT n FROM travel",
        PreparedPlan::new("SELECT n FROM travel", "stale", Some("plan-v1".into())),
    );

    let result = h
        .executor
        .query(QueryRequest::new("SELECT n FROM travel").adhoc(false))
        .await
        .unwrap();

    assert!(result.final_success);
    assert_eq!(result.rows, vec![json!({"n": 1})]);
    assert_eq!(h.transport.prepare_count(), 1);
    assert_eq!(h.transport.execute_count(), 2);
    assert_eq!(h.cache.peek("SELECT n FROM travel").unwrap().name, "fresh");
    assert_eq!(h.metrics.snapshot().prepared_retries, 1);
}

#[tokio::test]
async fn test_retry_is_bounded_to_one_round() {
    let h = harness(|req| {
        if is_prepare(req) {
            Ok(mock::prepared("p", Some("enc")))
        } else {
            Ok(mock::query_error(PREPARED_STALE, "plan version mismatch"))
        }
    });

    let result = h
        .executor
        .query(QueryRequest::new("SELECT 2").adhoc(false))
        .await
        .unwrap();

    assert!(!result.final_success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0]["code"], PREPARED_STALE);
    // Cold miss prepares once, the retry round prepares once more
    assert_eq!(h.transport.prepare_count(), 2);
    assert_eq!(h.transport.execute_count(), 2);
}

#[tokio::test]
async fn test_index_not_found_internal_error_triggers_retry() {
    let h = harness(|req| {
        if is_prepare(req) {
            return Ok(mock::prepared("fresh", Some("enc")));
        }
        match prepared_name(req).as_deref() {
            Some("stale") => Ok(mock::query_error(
                INTERNAL_ERROR,
                &format!("index scan failed: {}", INDEX_NOT_FOUND_MARKER),
            )),
            _ => Ok(mock::query_success(&[])),
        }
    });
    h.cache.put("SELECT 3", PreparedPlan::new("SELECT 3", "stale", None));

    let result = h
        .executor
        .query(QueryRequest::new("SELECT 3").adhoc(false))
        .await
        .unwrap();

    assert!(result.final_success);
    assert_eq!(h.transport.prepare_count(), 1);
}

#[tokio::test]
async fn test_other_errors_are_reemitted_without_retry() {
    let errors = [
        json!({"code": 3000, "msg": "syntax error"}),
        json!({"code": INTERNAL_ERROR, "msg": "out of memory"}),
    ];
    let h = harness(move |req| {
        if is_prepare(req) {
            Ok(mock::prepared("p", Some("enc")))
        } else {
            Ok(mock::query_failure(&errors))
        }
    });

    let result = h
        .executor
        .query(QueryRequest::new("SELEC 1").adhoc(false))
        .await
        .unwrap();

    let codes: Vec<Value> = result.errors.iter().map(|e| e["code"].clone()).collect();
    assert_eq!(codes, vec![json!(3000), json!(INTERNAL_ERROR)]);
    assert_eq!(h.transport.prepare_count(), 1);
    assert_eq!(h.transport.execute_count(), 1);
    assert_eq!(h.metrics.snapshot().prepared_retries, 0);
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn test_prepared_select_end_to_end() {
    let h = harness(|req| {
        if is_prepare(req) {
            Ok(mock::prepared("p1", Some("abc")))
        } else {
            Ok(mock::query_success(&[json!({"$1": 1})]))
        }
    });

    let first = h
        .executor
        .query(QueryRequest::new("SELECT 1").adhoc(false))
        .await
        .unwrap();
    let second = h
        .executor
        .query(QueryRequest::new("SELECT 1").adhoc(false))
        .await
        .unwrap();

    assert_eq!(first.rows, vec![json!({"$1": 1})]);
    assert_eq!(second.rows, first.rows);

    let plan = h.cache.peek("SELECT 1").unwrap();
    assert_eq!(plan.name, "p1");
    assert_eq!(plan.encoded_plan.as_deref(), Some("abc"));

    // Second run is served from the cache
    assert_eq!(h.transport.prepare_count(), 1);
    assert_eq!(h.transport.execute_count(), 2);

    let executes: Vec<Value> = h
        .transport
        .query_frames()
        .into_iter()
        .filter(|frame| frame.is_execute())
        .map(|frame| frame.body)
        .collect();
    for body in executes {
        assert_eq!(body["prepared"], "p1");
        assert_eq!(body["encoded_plan"], "abc");
    }
}

#[tokio::test]
async fn test_invalidate_forces_new_prepare() {
    let h = harness(|req| {
        if is_prepare(req) {
            Ok(mock::prepared("p1", Some("abc")))
        } else {
            Ok(mock::query_success(&[]))
        }
    });
    let request = || QueryRequest::new("SELECT 1").adhoc(false);

    h.executor.query(request()).await.unwrap();
    assert_eq!(h.executor.invalidate_query_cache(), 1);
    h.executor.query(request()).await.unwrap();

    assert_eq!(h.transport.prepare_count(), 2);
}
