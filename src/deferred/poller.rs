//! Deferred query handles
//!
//! A deferred query runs server-side after submission. The client polls a
//! status URI until the server publishes a result handle, then fetches rows
//! from that handle. Both fetches retry temporary failures with backoff.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{stream, StreamExt, TryStreamExt};

use crate::config::DeferredConfig;
use crate::errors::{ClientError, ClientResult};
use crate::observability::ClientMetrics;
use crate::query::{decode_section, SectionStream};
use crate::transport::{
    DeferredResponse, Releasable, Request, ResponseStatus, SubscriptionGuard, Transport,
    TransportError,
};

use super::backoff::RetryPolicy;

/// Everything a fetch needs, cloneable into a lazy row stream
#[derive(Clone)]
struct Fetcher {
    transport: Arc<dyn Transport>,
    guard: SubscriptionGuard,
    metrics: Arc<ClientMetrics>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl Fetcher {
    async fn fetch_with_retry(
        &self,
        what: &str,
        request: Request,
    ) -> ClientResult<DeferredResponse> {
        let fetcher = self;
        self.policy
            .run(what, &self.metrics, move || fetcher.fetch_once(request.clone()))
            .await
    }

    async fn fetch_once(&self, request: Request) -> ClientResult<DeferredResponse> {
        let transport = Arc::clone(&self.transport);
        let watched = self.guard.wrap(move |watch| transport.send(request, watch));
        let response = tokio::time::timeout(self.timeout, watched)
            .await
            .map_err(|_| {
                TransportError::timeout(format!(
                    "deferred fetch exceeded {}ms",
                    self.timeout.as_millis()
                ))
            })??
            .into_deferred()?;

        if response.status == ResponseStatus::TemporaryFailure {
            let query_status = response.query_status.clone();
            response.release();
            return Err(TransportError::temporary(format!(
                "deferred query temporarily unavailable ({})",
                query_status
            ))
            .into());
        }
        Ok(response)
    }
}

/// Handle to one deferred query
pub struct DeferredQueryHandle {
    status_uri: String,
    result_handle: Mutex<Option<String>>,
    fetcher: Fetcher,
}

impl std::fmt::Debug for DeferredQueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueryHandle")
            .field("status_uri", &self.status_uri)
            .field("result_handle", &*self.lock_handle())
            .finish()
    }
}

impl DeferredQueryHandle {
    pub fn new(
        status_uri: impl Into<String>,
        transport: Arc<dyn Transport>,
        metrics: Arc<ClientMetrics>,
        config: &DeferredConfig,
    ) -> Self {
        Self {
            status_uri: status_uri.into(),
            result_handle: Mutex::new(None),
            fetcher: Fetcher {
                transport,
                guard: SubscriptionGuard::new(Arc::clone(&metrics)),
                metrics,
                policy: RetryPolicy::from_config(config),
                timeout: config.timeout(),
            },
        }
    }

    /// Override the retry schedule
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.fetcher.policy = policy;
        self
    }

    pub fn status_uri(&self) -> &str {
        &self.status_uri
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.result_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Captured result handle; fails until a status poll has published one
    pub fn result_handle_uri(&self) -> ClientResult<String> {
        self.lock_handle().clone().ok_or_else(|| {
            ClientError::precondition(
                "no result handle available yet, poll status until the query succeeds",
            )
        })
    }

    /// Poll the query status once, capturing the result handle if present
    pub async fn status(&self) -> ClientResult<String> {
        let request = Request::DeferredStatus {
            uri: self.status_uri.clone(),
        };
        let DeferredResponse {
            query_status,
            result_handle,
            rows,
            ..
        } = self.fetcher.fetch_with_retry("status", request).await?;
        rows.release();

        if let Some(handle) = result_handle {
            *self.lock_handle() = Some(handle);
        }
        Ok(query_status)
    }

    /// Rows behind the result handle.
    ///
    /// Fails at once when no handle has been captured. Otherwise nothing is
    /// sent until the returned stream is first polled.
    pub fn rows(&self) -> ClientResult<SectionStream> {
        let uri = self.result_handle_uri()?;
        let fetcher = self.fetcher.clone();
        let fetch = async move {
            let response = fetcher
                .fetch_with_retry("result", Request::DeferredResult { uri })
                .await?;
            Ok::<_, ClientError>(decode_section(response.rows, "deferred rows"))
        };
        Ok(stream::once(fetch).try_flatten().boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{self, ScriptedTransport};
    use crate::transport::Response;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(1),
            factor: 2,
            max_retries: 10,
            max_delay: Some(Duration::from_millis(5)),
        }
    }

    fn handle(transport: Arc<ScriptedTransport>) -> DeferredQueryHandle {
        DeferredQueryHandle::new(
            "/status/1",
            transport,
            Arc::new(ClientMetrics::new()),
            &DeferredConfig::default(),
        )
        .with_policy(fast_policy())
    }

    fn temporary_status() -> Response {
        Response::Deferred(DeferredResponse::status_only(
            ResponseStatus::TemporaryFailure,
            "running",
            None,
        ))
    }

    #[tokio::test]
    async fn test_rows_without_handle_is_precondition() {
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(mock::deferred_rows(&[]))));
        let handle = handle(Arc::clone(&transport));

        let err = handle.rows().err().unwrap();
        assert!(matches!(err, ClientError::Precondition(_)));
        assert!(handle.result_handle_uri().is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_status_captures_handle_then_rows() {
        let transport = Arc::new(ScriptedTransport::new(|req| match req {
            Request::DeferredStatus { .. } => Ok(mock::deferred_status("success", Some("/result/1"))),
            Request::DeferredResult { uri } => {
                assert_eq!(uri, "/result/1");
                Ok(mock::deferred_rows(&[json!({"n": 1}), json!({"n": 2})]))
            }
            other => panic!("unexpected request {:?}", other),
        }));
        let handle = handle(Arc::clone(&transport));

        assert_eq!(handle.status().await.unwrap(), "success");
        assert_eq!(handle.result_handle_uri().unwrap(), "/result/1");

        let rows = handle.rows().unwrap();
        assert_eq!(transport.requests().len(), 1);

        let rows: Vec<_> = rows.try_collect().await.unwrap();
        assert_eq!(rows, vec![json!({"n": 1}), json!({"n": 2})]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_running_status_keeps_no_handle() {
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(mock::deferred_status("running", None))));
        let handle = handle(transport);

        assert_eq!(handle.status().await.unwrap(), "running");
        assert!(handle.rows().is_err());
    }

    #[tokio::test]
    async fn test_status_retries_temporary_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transport = Arc::new(ScriptedTransport::new(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(TransportError::temporary("node warming up")),
                1 => Ok(temporary_status()),
                _ => Ok(mock::deferred_status("success", Some("/result/9"))),
            }
        }));
        let handle = handle(transport);

        assert_eq!(handle.status().await.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handle.result_handle_uri().unwrap(), "/result/9");
    }

    #[tokio::test]
    async fn test_status_gives_up_after_max_retries() {
        let transport = Arc::new(ScriptedTransport::new(|_| Ok(temporary_status())));
        let handle = handle(Arc::clone(&transport)).with_policy(RetryPolicy {
            max_retries: 2,
            ..fast_policy()
        });

        let err = handle.status().await.unwrap_err();
        assert!(err.transport().unwrap().is_transient());
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(|_| Err(TransportError::io("refused"))));
        let handle = handle(Arc::clone(&transport));

        assert!(handle.status().await.is_err());
        assert_eq!(transport.requests().len(), 1);
    }
}
