use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use bytestring::ByteString;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;

/// A raw message handed over by the transport, not yet dispatched.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InboundMessage {
    pub topic: ByteString,
    pub payload: Bytes,
}

impl InboundMessage {
    #[inline]
    pub fn new<T: Into<ByteString>, P: Into<Bytes>>(topic: T, payload: P) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }
}

/// FIFO buffer between the transport's receive context and the pump.
///
/// One producer (the transport notification, any thread), one consumer
/// (the pump). The buffer is unbounded; producers are never blocked beyond
/// the lock hold time and messages are never dropped while the queue is
/// open. `drain_all` takes the whole batch so the lock is not held while
/// messages are being dispatched.
#[derive(Clone)]
pub struct InboundQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    buf: Mutex<VecDeque<InboundMessage>>,
    closed: AtomicBool,
    inflight: AtomicUsize,
    idle: Notify,
}

impl Drop for QueueInner {
    fn drop(&mut self) {
        let remaining = self.buf.get_mut().len();
        if remaining > 0 {
            log::debug!("InboundQueue drop, remaining: {}", remaining);
        }
    }
}

impl Default for InboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                buf: Mutex::new(VecDeque::new()),
                closed: AtomicBool::new(false),
                inflight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Producer-side handle for the transport.
    #[inline]
    pub fn ingress(&self) -> Ingress {
        Ingress(self.clone())
    }

    /// Appends a message. Returns false once the queue has been closed, in
    /// which case the message is discarded.
    pub fn push<T: Into<ByteString>, P: Into<Bytes>>(&self, topic: T, payload: P) -> bool {
        let inner = &self.inner;
        inner.inflight.fetch_add(1, Ordering::AcqRel);
        let _guard = scopeguard::guard(inner, |inner| {
            if inner.inflight.fetch_sub(1, Ordering::AcqRel) == 1 {
                inner.idle.notify_waiters();
            }
        });
        if inner.closed.load(Ordering::Acquire) {
            return false;
        }
        inner.buf.lock().push_back(InboundMessage::new(topic, payload));
        true
    }

    /// Atomically removes and returns everything queued so far. Messages
    /// arriving while the returned batch is being processed wait for the
    /// next drain.
    #[inline]
    pub fn drain_all(&self) -> VecDeque<InboundMessage> {
        std::mem::take(&mut *self.inner.buf.lock())
    }

    /// Revokes the producer side; later pushes are refused.
    #[inline]
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Waits until no producer is executing inside `push`, bounded by
    /// `timeout`. Combined with `close` this guarantees the transport
    /// notification has left the queue before shared state is torn down.
    pub async fn wait_idle(&self, timeout: Duration) -> Result<(), Elapsed> {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                // register before the check so a decrement between the
                // check and the await cannot be missed
                notified.as_mut().enable();
                if self.inner.inflight.load(Ordering::Acquire) == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.buf.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Push-only view of the queue, handed to the transport as the
/// message-received registration point.
#[derive(Clone)]
pub struct Ingress(InboundQueue);

impl Ingress {
    /// See [`InboundQueue::push`].
    #[inline]
    pub fn push<T: Into<ByteString>, P: Into<Bytes>>(&self, topic: T, payload: P) -> bool {
        self.0.push(topic, payload)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}
