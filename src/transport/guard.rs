//! Subscription guard for one-shot transport calls
//!
//! The source is driven on its own task. Its first item goes to the
//! consumer if the consumer is still waiting; otherwise the guard releases
//! it. If the consumer goes away while the source is pending, the source is
//! dropped, which cancels the in-flight request.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::oneshot;

use crate::observability::{log_event, ClientMetrics, Event};

use super::errors::{TransportError, TransportResult};
use super::Releasable;

/// Lets a source check whether anyone still waits for its output
#[derive(Debug, Clone)]
pub struct ConsumerWatch {
    attached: Arc<AtomicBool>,
}

impl ConsumerWatch {
    /// A watch that is never detached, for calls made outside a guard
    pub fn always_attached() -> Self {
        Self {
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// Wraps one-shot sources so their payloads are never leaked
#[derive(Debug, Clone, Default)]
pub struct SubscriptionGuard {
    metrics: Arc<ClientMetrics>,
}

impl SubscriptionGuard {
    pub fn new(metrics: Arc<ClientMetrics>) -> Self {
        Self { metrics }
    }

    /// Build the source through `factory` and watch its single delivery
    pub fn wrap<T, F>(&self, factory: F) -> Watched<T>
    where
        T: Releasable + Send + 'static,
        F: FnOnce(ConsumerWatch) -> BoxStream<'static, TransportResult<T>>,
    {
        let attached = Arc::new(AtomicBool::new(true));
        let watch = ConsumerWatch {
            attached: Arc::clone(&attached),
        };
        let source = factory(watch);
        let (tx, rx) = oneshot::channel();
        let metrics = Arc::clone(&self.metrics);

        tokio::spawn(deliver(source, tx, metrics));

        Watched { rx, attached }
    }
}

async fn deliver<T>(
    mut source: BoxStream<'static, TransportResult<T>>,
    mut tx: oneshot::Sender<TransportResult<T>>,
    metrics: Arc<ClientMetrics>,
) where
    T: Releasable + Send + 'static,
{
    let first = tokio::select! {
        biased;
        // Consumer left before anything arrived; dropping the source cancels it
        _ = tx.closed() => return,
        item = source.next() => item,
    };

    let outcome = match first {
        Some(result) => result,
        None => Err(TransportError::closed(
            "source completed without producing a response",
        )),
    };

    if let Err(Ok(undelivered)) = tx.send(outcome) {
        undelivered.release();
        metrics.increment_undelivered_released();
        log_event(Event::UndeliveredReleased, &[]);
    }

    // One-shot sources must not emit twice; release anything already queued
    while let Some(Some(extra)) = source.next().now_or_never() {
        if let Ok(item) = extra {
            item.release();
            metrics.increment_undelivered_released();
        }
    }
}

/// Pending single delivery from a guarded source
#[derive(Debug)]
pub struct Watched<T> {
    rx: oneshot::Receiver<TransportResult<T>>,
    attached: Arc<AtomicBool>,
}

impl<T> Future for Watched<T> {
    type Output = TransportResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransportError::cancelled(
                "source task ended before delivery",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Watched<T> {
    fn drop(&mut self) {
        self.attached.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::buffer::RefBuf;
    use futures_util::stream;
    use std::time::Duration;
    use tokio::sync::oneshot as tokio_oneshot;

    #[tokio::test]
    async fn test_attached_consumer_receives_item_untouched() {
        let guard = SubscriptionGuard::default();
        let buf = RefBuf::new(&b"payload"[..]);
        let tracker = buf.tracker();

        let watched = guard.wrap(move |_| stream::once(async move { Ok(buf) }).boxed());
        let received = watched.await.unwrap();

        assert_eq!(tracker.ref_count(), 1);
        assert_eq!(received.data(), b"payload");
    }

    #[tokio::test]
    async fn test_cancelled_consumer_item_released() {
        let metrics = Arc::new(ClientMetrics::new());
        let guard = SubscriptionGuard::new(Arc::clone(&metrics));
        let buf = RefBuf::new(&b"late"[..]);
        let tracker = buf.tracker();
        let (release_tx, release_rx) = tokio_oneshot::channel::<()>();

        let watched = guard.wrap(move |_| {
            stream::once(async move {
                let _ = release_rx.await;
                Ok(buf)
            })
            .boxed()
        });
        drop(watched);
        let _ = release_tx.send(());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(tracker.ref_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_source_reports_closed() {
        let guard = SubscriptionGuard::default();
        let watched = guard.wrap(|_| stream::empty::<TransportResult<RefBuf>>().boxed());
        let err = watched.await.unwrap_err();
        assert_eq!(err.kind(), crate::transport::TransportErrorKind::Closed);
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        let guard = SubscriptionGuard::default();
        let watched = guard.wrap(|_| {
            stream::once(async { Err::<RefBuf, _>(TransportError::backpressure("full")) }).boxed()
        });
        assert_eq!(watched.await.unwrap_err(), TransportError::backpressure("full"));
    }

    #[tokio::test]
    async fn test_surplus_items_released() {
        let guard = SubscriptionGuard::default();
        let first = RefBuf::new(&b"1"[..]);
        let second = RefBuf::new(&b"2"[..]);
        let second_tracker = second.tracker();

        let watched = guard.wrap(move |_| stream::iter(vec![Ok(first), Ok(second)]).boxed());
        let received = watched.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(received.data(), b"1");
        assert!(second_tracker.is_released());
    }

    #[tokio::test]
    async fn test_watch_observes_detach() {
        let guard = SubscriptionGuard::default();
        let (watch_tx, watch_rx) = std::sync::mpsc::channel();
        let watched = guard.wrap(move |watch| {
            let _ = watch_tx.send(watch);
            stream::pending::<TransportResult<RefBuf>>().boxed()
        });
        let watch = watch_rx.recv().unwrap();
        assert!(watch.is_attached());
        drop(watched);
        assert!(!watch.is_attached());
    }
}
