//! Transport seam
//!
//! The wire transport is an external collaborator. The driver only needs
//! `send(request) -> stream of responses`; everything else in this module
//! is the vocabulary shared across that seam: request and response shapes,
//! reference-counted payload buffers, and the subscription guard that keeps
//! those buffers from leaking when a caller gives up early.

mod buffer;
mod errors;
mod guard;
pub mod mock;
mod request;
mod response;

pub use buffer::{BufTracker, BufferSink, BufferStream, RefBuf};
pub use errors::{TransportError, TransportErrorKind, TransportResult};
pub use guard::{ConsumerWatch, SubscriptionGuard, Watched};
pub use request::{ObserveProbe, QueryFrame, Request};
pub use response::{
    DeferredResponse, ObserveResponse, QueryResponse, QueryResponseSender, Response,
    ResponseStatus,
};

use futures_util::stream::BoxStream;

/// Stream of responses for one request
pub type ResponseStream = BoxStream<'static, TransportResult<Response>>;

/// A resource that must be handed back exactly once
pub trait Releasable {
    fn release(self);
}

/// Asynchronous request/response capability
///
/// Implementations should stop work for a request once
/// [`ConsumerWatch::is_attached`] turns false, and must tolerate the
/// returned stream being dropped at any point.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request, watch: ConsumerWatch) -> ResponseStream;
}
