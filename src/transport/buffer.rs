//! Reference-counted response buffers
//!
//! Every payload a transport hands to the driver is a [`RefBuf`]. Whoever
//! consumes a buffer decodes it and then releases it. A buffer that is
//! dropped without an explicit release is released on drop, so the count
//! can never stay pinned by a forgotten handle.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::mpsc;

use super::Releasable;

#[derive(Debug)]
struct BufInner {
    data: Bytes,
    refs: AtomicUsize,
}

impl BufInner {
    /// Decrement without going below zero
    fn decrement(&self) {
        let _ = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

/// A payload buffer owned by exactly one holder at a time
#[derive(Debug)]
pub struct RefBuf {
    inner: Arc<BufInner>,
    released: bool,
}

impl RefBuf {
    /// Create a buffer with a reference count of one
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            inner: Arc::new(BufInner {
                data: data.into(),
                refs: AtomicUsize::new(1),
            }),
            released: false,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.inner.data
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Observer for the reference count that outlives the buffer
    pub fn tracker(&self) -> BufTracker {
        BufTracker {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Parse the payload as JSON, then release the buffer
    pub fn decode_json(self) -> Result<serde_json::Value, serde_json::Error> {
        let parsed = serde_json::from_slice(self.data());
        self.release();
        parsed
    }

    /// Give up this holder's reference
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.decrement();
        }
    }
}

impl Drop for RefBuf {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl Releasable for RefBuf {
    fn release(self) {
        RefBuf::release(self)
    }
}

/// Read-only view of a buffer's reference count
#[derive(Debug, Clone)]
pub struct BufTracker {
    inner: Arc<BufInner>,
}

impl BufTracker {
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.ref_count() == 0
    }
}

/// Independently consumable stream of buffers for one response section
#[derive(Debug)]
pub struct BufferStream {
    rx: mpsc::UnboundedReceiver<RefBuf>,
}

impl BufferStream {
    /// Create a connected sender and stream
    pub fn channel() -> (BufferSink, BufferStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BufferSink { tx }, BufferStream { rx })
    }

    /// A stream that is already complete
    pub fn empty() -> Self {
        let (_, stream) = Self::channel();
        stream
    }

    /// A completed stream holding the given payloads
    pub fn from_payloads<I, B>(payloads: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let (sink, stream) = Self::channel();
        for payload in payloads {
            sink.push(payload);
        }
        stream
    }
}

impl Stream for BufferStream {
    type Item = RefBuf;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Releasable for BufferStream {
    /// Stop accepting buffers and release everything still queued
    fn release(mut self) {
        self.rx.close();
        while let Ok(buf) = self.rx.try_recv() {
            buf.release();
        }
    }
}

/// Producer half of a [`BufferStream`]
#[derive(Debug, Clone)]
pub struct BufferSink {
    tx: mpsc::UnboundedSender<RefBuf>,
}

impl BufferSink {
    /// Push a payload; returns false when the consumer is gone
    pub fn push(&self, payload: impl Into<Bytes>) -> bool {
        self.tx.send(RefBuf::new(payload)).is_ok()
    }

    /// Push an existing buffer; an unaccepted buffer is released
    pub fn push_buf(&self, buf: RefBuf) -> bool {
        match self.tx.send(buf) {
            Ok(()) => true,
            Err(mpsc::error::SendError(buf)) => {
                buf.release();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn test_new_buffer_has_one_reference() {
        let buf = RefBuf::new(&b"{}"[..]);
        assert_eq!(buf.ref_count(), 1);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_release_drops_to_zero() {
        let buf = RefBuf::new(&b"x"[..]);
        let tracker = buf.tracker();
        buf.release();
        assert_eq!(tracker.ref_count(), 0);
        assert!(tracker.is_released());
    }

    #[test]
    fn test_drop_releases_once() {
        let buf = RefBuf::new(&b"x"[..]);
        let tracker = buf.tracker();
        drop(buf);
        assert_eq!(tracker.ref_count(), 0);
    }

    #[test]
    fn test_decode_json_releases() {
        let buf = RefBuf::new(&br#"{"a":1}"#[..]);
        let tracker = buf.tracker();
        let value = buf.decode_json().unwrap();
        assert_eq!(value["a"], 1);
        assert!(tracker.is_released());
    }

    #[test]
    fn test_decode_json_releases_on_error() {
        let buf = RefBuf::new(&b"{"[..]);
        let tracker = buf.tracker();
        assert!(buf.decode_json().is_err());
        assert!(tracker.is_released());
    }

    #[tokio::test]
    async fn test_buffer_stream_yields_in_order() {
        let stream = BufferStream::from_payloads(vec![&b"1"[..], &b"2"[..]]);
        let items: Vec<_> = stream.map(|b| b.data().to_vec()).collect().await;
        assert_eq!(items, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_stream_release_frees_queued_buffers() {
        let (sink, stream) = BufferStream::channel();
        let buf = RefBuf::new(&b"queued"[..]);
        let tracker = buf.tracker();
        assert!(sink.push_buf(buf));

        Releasable::release(stream);
        assert!(tracker.is_released());
        assert!(!sink.push(&b"late"[..]));
    }
}
