//! Query executor
//!
//! Ad-hoc statements are sent as-is. Everything else goes through the
//! prepared plan cache:
//!
//! 1. Cache hit: EXECUTE the cached plan.
//! 2. Cache miss: PREPARE, cache the plan, EXECUTE.
//! 3. If the EXECUTE was rejected, its error section is collected. A
//!    stale-plan error drops the cached plan and runs PREPARE + EXECUTE
//!    exactly once more; that second outcome is returned as-is. Any other
//!    errors are re-emitted unchanged.
//!
//! Concurrent callers preparing the same cold statement each send their
//! own PREPARE.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, FuturesUnordered};
use futures_util::{StreamExt, TryStreamExt};
use serde_json::{json, Value};

use crate::config::QueryConfig;
use crate::errors::{ClientError, ClientResult};
use crate::observability::{log_event, ClientMetrics, Event};
use crate::routing::{NodeLocator, RoutingError};
use crate::transport::{
    QueryFrame, QueryResponse, Releasable, Request, Response, SubscriptionGuard, Transport,
    TransportError, Watched,
};

use super::cache::PreparedPlanCache;
use super::errors::QueryServerError;
use super::plan::{prepare_bucket_statement, PreparedPlan};
use super::request::QueryRequest;
use super::result::{decode_section, AsyncQueryResult, QueryResult};

/// Outcome of inspecting a rejected EXECUTE
enum Peek {
    Pass(AsyncQueryResult),
    Retry(QueryServerError),
}

/// Runs queries against one bucket
pub struct QueryExecutor {
    bucket: String,
    transport: Arc<dyn Transport>,
    locator: Arc<NodeLocator>,
    cache: Arc<PreparedPlanCache>,
    guard: SubscriptionGuard,
    metrics: Arc<ClientMetrics>,
    encoded_plan_enabled: bool,
    default_timeout: Duration,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("bucket", &self.bucket)
            .field("cached_plans", &self.cache.len())
            .field("encoded_plan_enabled", &self.encoded_plan_enabled)
            .finish()
    }
}

impl QueryExecutor {
    pub fn new(
        bucket: impl Into<String>,
        transport: Arc<dyn Transport>,
        locator: Arc<NodeLocator>,
        cache: Arc<PreparedPlanCache>,
        metrics: Arc<ClientMetrics>,
        config: &QueryConfig,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            transport,
            locator,
            cache,
            guard: SubscriptionGuard::new(Arc::clone(&metrics)),
            metrics,
            encoded_plan_enabled: config.encoded_plan_enabled,
            default_timeout: config.timeout(),
        }
    }

    pub fn cache(&self) -> &PreparedPlanCache {
        &self.cache
    }

    /// Clear the plan cache, returning how many plans it held
    pub fn invalidate_query_cache(&self) -> usize {
        let evicted = self.cache.clear();
        log_event(
            Event::PlanCacheCleared,
            &[("evicted", &evicted.to_string())],
        );
        evicted
    }

    /// Execute a query and return its streaming result
    pub async fn execute(&self, request: QueryRequest) -> ClientResult<AsyncQueryResult> {
        let timeout = request.timeout_value().unwrap_or(self.default_timeout);
        match tokio::time::timeout(timeout, self.dispatch(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::timeout(format!(
                "query {} did not complete within {:?}",
                request.context_id(),
                timeout
            ))
            .into()),
        }
    }

    /// Execute a query and materialize every section
    pub async fn query(&self, request: QueryRequest) -> ClientResult<QueryResult> {
        self.execute(request).await?.collect().await
    }

    async fn dispatch(&self, request: &QueryRequest) -> ClientResult<AsyncQueryResult> {
        if request.is_adhoc() {
            self.metrics.increment_adhoc_executes();
            log_event(Event::AdhocExecuted, &[("context_id", request.context_id())]);
            let frame = self.frame(request.adhoc_body(&self.bucket), request);
            let response = self.send_query(frame).await?;
            return Ok(AsyncQueryResult::from_response(response));
        }
        self.dispatch_prepared(request).await
    }

    async fn dispatch_prepared(&self, request: &QueryRequest) -> ClientResult<AsyncQueryResult> {
        let first = match self.cache.get(request.cache_key()) {
            Some(plan) => {
                log_event(Event::PlanCacheHit, &[("plan", &plan.name)]);
                self.execute_plan(request, &plan).await?
            }
            None => self.prepare_and_execute(request).await?,
        };

        match peek_for_retry(first).await {
            Peek::Pass(result) => Ok(result),
            Peek::Retry(trigger) => self.retry_prepare_and_execute_once(request, trigger).await,
        }
    }

    async fn retry_prepare_and_execute_once(
        &self,
        request: &QueryRequest,
        trigger: QueryServerError,
    ) -> ClientResult<AsyncQueryResult> {
        if let Some(stale) = self.cache.remove(request.cache_key()) {
            log_event(
                Event::PlanInvalidated,
                &[("plan", &stale.name), ("code", &trigger.code.to_string())],
            );
        }
        self.metrics.increment_prepared_retries();
        log_event(
            Event::PreparedRetry,
            &[
                ("context_id", request.context_id()),
                ("code", &trigger.code.to_string()),
            ],
        );
        self.prepare_and_execute(request).await
    }

    async fn prepare_and_execute(&self, request: &QueryRequest) -> ClientResult<AsyncQueryResult> {
        let plan = self.prepare(request).await?;
        self.cache.put(request.cache_key(), plan.clone());
        log_event(Event::PlanCached, &[("plan", &plan.name)]);
        self.execute_plan(request, &plan).await
    }

    async fn execute_plan(
        &self,
        request: &QueryRequest,
        plan: &PreparedPlan,
    ) -> ClientResult<AsyncQueryResult> {
        self.metrics.increment_executes();
        let body = request.execute_body(plan, self.encoded_plan_enabled);
        let response = self.send_query(self.frame(body, request)).await?;
        Ok(AsyncQueryResult::from_response(response))
    }

    /// PREPARE the statement, broadcasting when plans are not shipped inline
    async fn prepare(&self, request: &QueryRequest) -> ClientResult<PreparedPlan> {
        let (name, text) = prepare_bucket_statement(request.cache_key(), &self.bucket);
        let body = json!({
            "statement": text,
            "client_context_id": request.context_id(),
        });

        if self.encoded_plan_enabled {
            self.metrics.increment_prepares();
            log_event(Event::PrepareIssued, &[("plan", &name)]);
            let response = self.send_query(self.frame(body, request)).await?;
            return extract_plan(request.cache_key(), response).await;
        }

        let nodes = self.locator.query_nodes();
        if nodes.is_empty() {
            return Err(RoutingError::NoQueryNodes.into());
        }
        log_event(
            Event::PrepareBroadcast,
            &[("plan", &name), ("nodes", &nodes.len().to_string())],
        );

        // Every node is sent the PREPARE up front; the first plan back wins
        // and dropping the rest detaches their pending responses
        let mut pending: FuturesUnordered<_> = nodes
            .iter()
            .map(|node| {
                self.metrics.increment_prepares();
                let frame = self.frame(body.clone(), request).with_target(node.address());
                let transport = Arc::clone(&self.transport);
                let watched = self
                    .guard
                    .wrap(move |watch| transport.send(Request::Query(frame), watch));
                plan_from(watched, request.cache_key())
            })
            .collect();

        let mut failures = Vec::new();
        while let Some(outcome) = pending.next().await {
            match outcome {
                Ok(plan) => return Ok(plan),
                Err(err) => failures.push(err),
            }
        }
        match failures.len() {
            0 => Err(RoutingError::NoQueryNodes.into()),
            1 => Err(failures.remove(0)),
            _ => Err(ClientError::from_prepare_failures(failures)),
        }
    }

    fn frame(&self, body: Value, request: &QueryRequest) -> QueryFrame {
        let frame = QueryFrame::new(body, request.context_id());
        match request.timeout_value() {
            Some(timeout) => frame.with_timeout(timeout),
            None => frame,
        }
    }

    async fn send_query(&self, frame: QueryFrame) -> ClientResult<QueryResponse> {
        let transport = Arc::clone(&self.transport);
        let response = self
            .guard
            .wrap(move |watch| transport.send(Request::Query(frame), watch))
            .await?;
        Ok(response.into_query()?)
    }
}

/// Collect the error section of a rejected result and classify it
async fn peek_for_retry(mut result: AsyncQueryResult) -> Peek {
    if result.parse_success {
        return Peek::Pass(result);
    }

    let errors = std::mem::replace(&mut result.errors, stream::empty().boxed());
    let collected: Vec<ClientResult<Value>> = errors.collect().await;

    let trigger = collected
        .iter()
        .filter_map(|item| item.as_ref().ok())
        .map(QueryServerError::from_value)
        .filter(QueryServerError::is_retry_trigger)
        .last();

    match trigger {
        Some(err) => Peek::Retry(err),
        None => Peek::Pass(result.with_errors(collected)),
    }
}

/// Await one broadcast PREPARE and extract its plan
async fn plan_from(watched: Watched<Response>, statement: &str) -> ClientResult<PreparedPlan> {
    let response = watched.await?.into_query()?;
    extract_plan(statement, response).await
}

/// Turn a PREPARE response into a plan, releasing every unused section
async fn extract_plan(statement: &str, response: QueryResponse) -> ClientResult<PreparedPlan> {
    let QueryResponse {
        status,
        rows,
        signature,
        info,
        errors,
        profile,
        ..
    } = response;
    signature.release();
    info.release();
    profile.release();

    if status.is_success() {
        errors.release();
        let rows: Vec<Value> = decode_section(rows, "prepared plan").try_collect().await?;
        let last = rows
            .last()
            .ok_or_else(|| ClientError::decode("PREPARE response without a plan row"))?;
        return PreparedPlan::from_prepare_row(statement, last);
    }

    rows.release();
    let mut failures: Vec<ClientError> = decode_section(errors, "prepare errors")
        .map(|item| match item {
            Ok(value) => ClientError::QueryServer(QueryServerError::from_value(&value)),
            Err(err) => err,
        })
        .collect()
        .await;
    if failures.is_empty() {
        failures.push(ClientError::decode("PREPARE failed without an error payload"));
    }
    Err(ClientError::from_prepare_failures(failures))
}
