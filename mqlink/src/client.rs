use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use bytestring::ByteString;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientOptions;
use crate::error::ClientError;
use crate::queue::InboundQueue;
use crate::subscription::{self, MessageCallback, SubscriptionRegistry};
use crate::transport::{QoS, Transport};

/// Connection lifecycle, as observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Client facade over one broker connection.
///
/// Owns the subscription registry, the inbound queue and the connect
/// retry task. Cheap to clone and share; clones refer to the same
/// connection.
///
/// The host drives delivery by calling [`MqttClient::pump`] on a regular
/// cadence from a single task; all other methods may be called from
/// anywhere.
#[derive(Clone)]
pub struct MqttClient {
    inner: Arc<ClientInner>,
}

pub struct ClientInner {
    pub cfg: ClientOptions,
    transport: Arc<dyn Transport>,
    subscriptions: RwLock<SubscriptionRegistry>,
    queue: InboundQueue,
    state: RwLock<ConnectionState>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Deref for MqttClient {
    type Target = ClientInner;
    #[inline]
    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MqttClient({:?}, {:?})", self.cfg.server_addr(), self.state())?;
        Ok(())
    }
}

impl MqttClient {
    /// Wires the transport's inbound side to this client's queue.
    pub fn new(cfg: ClientOptions, transport: Arc<dyn Transport>) -> Self {
        let queue = InboundQueue::new();
        transport.set_inbound(queue.ingress());
        MqttClient {
            inner: Arc::new(ClientInner {
                cfg,
                transport,
                subscriptions: RwLock::new(SubscriptionRegistry::new()),
                queue,
                state: RwLock::new(ConnectionState::Disconnected),
                retry_task: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Begins connecting if auto connect is enabled. Safe to skip when
    /// the host prefers an explicit [`MqttClient::try_connect`].
    pub fn start(&self) {
        if self.cfg.auto_connect {
            self.try_connect();
        }
    }

    /// Starts the connect retry task. No-op while already connecting,
    /// connected or stopped.
    pub fn try_connect(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.state.write();
            if !matches!(*state, ConnectionState::Disconnected) {
                return;
            }
            *state = ConnectionState::Connecting;
        }
        let task = tokio::spawn(self.clone().connect_loop());
        *self.retry_task.lock() = Some(task);
    }

    //Repeats the transport connect call at a fixed interval until it
    //succeeds, then resubscribes every active filter in one bulk call.
    async fn connect_loop(self) {
        let sleep_interval = self.cfg.reconnect_interval;
        loop {
            match self.connect_once().await {
                Ok(()) => {
                    log::info!("Successfully connected to {:?}", self.cfg.server_addr());
                    *self.state.write() = ConnectionState::Connected;
                    let filters = self.subscriptions.read().all_filters();
                    if !filters.is_empty() {
                        if let Err(e) = self.transport.subscribe_topics(filters).await {
                            log::warn!("Resubscribe to {:?} fail, {:?}", self.cfg.server_addr(), e);
                        }
                    }
                    break;
                }
                Err(e) => {
                    log::warn!("Connect to {:?} fail, {:?}", self.cfg.server_addr(), e.to_string());
                }
            }
            if self.closed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(sleep_interval).await;
        }
    }

    //One connect attempt, bounded by connect_timeout when set. A timed
    //out attempt fails like any other and the loop retries it.
    async fn connect_once(&self) -> crate::Result<()> {
        match self.cfg.connect_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.transport.connect()).await {
                Ok(res) => res,
                Err(_) => Err(anyhow::anyhow!("connect timed out after {:?}", timeout)),
            },
            None => self.transport.connect().await,
        }
    }

    /// Cancels any in-flight connect attempt and tears the transport
    /// down. Teardown errors are logged, never surfaced.
    pub async fn disconnect(&self) {
        let task = self.retry_task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
        if let Err(e) = self.transport.disconnect().await {
            log::debug!("Disconnect from {:?}, {:?}", self.cfg.server_addr(), e.to_string());
        }
        *self.state.write() = ConnectionState::Disconnected;
    }

    /// Registers `callback` under `filter`. The first registration of a
    /// filter is forwarded to the broker when connected; while
    /// disconnected only the registry updates, and the next successful
    /// connect resubscribes in bulk.
    pub async fn subscribe(&self, filter: &str, callback: MessageCallback) {
        let is_new = self.subscriptions.write().add(filter, callback);
        if is_new && self.is_connected() {
            if let Err(e) = self.transport.subscribe_topics(vec![ByteString::from(filter)]).await {
                log::warn!("Subscribe to {:?} fail, {:?}", filter, e.to_string());
            }
        }
    }

    /// Registers the same callback under several filters, forwarding
    /// the previously-unseen ones to the broker in a single call.
    pub async fn subscribe_many(&self, filters: &[&str], callback: MessageCallback) {
        let mut new_filters = Vec::new();
        {
            let mut subs = self.subscriptions.write();
            for filter in filters.iter().copied() {
                if subs.add(filter, callback.clone()) {
                    new_filters.push(ByteString::from(filter));
                }
            }
        }
        if new_filters.is_empty() || !self.is_connected() {
            return;
        }
        if let Err(e) = self.transport.subscribe_topics(new_filters).await {
            log::warn!("Subscribe to {:?} fail, {:?}", filters, e.to_string());
        }
    }

    /// Drops `callback` from `filter`. Removing the last callback of a
    /// filter unsubscribes it at the broker when connected. Unknown
    /// filters and callbacks only log a warning.
    pub async fn unsubscribe(&self, filter: &str, callback: &MessageCallback) {
        let status = self.subscriptions.write().remove(filter, callback);
        if !status.was_found {
            log::warn!("Unsubscribe from {:?}, no matching subscription", filter);
            return;
        }
        if status.now_empty && self.is_connected() {
            if let Err(e) = self.transport.unsubscribe_topics(vec![ByteString::from(filter)]).await {
                log::warn!("Unsubscribe from {:?} fail, {:?}", filter, e.to_string());
            }
        }
    }

    /// [`MqttClient::unsubscribe`] over several filters, batching the
    /// broker unsubscribe for those left without callbacks.
    pub async fn unsubscribe_many(&self, filters: &[&str], callback: &MessageCallback) {
        let mut removed = Vec::new();
        {
            let mut subs = self.subscriptions.write();
            for filter in filters.iter().copied() {
                let status = subs.remove(filter, callback);
                if !status.was_found {
                    log::warn!("Unsubscribe from {:?}, no matching subscription", filter);
                } else if status.now_empty {
                    removed.push(ByteString::from(filter));
                }
            }
        }
        if removed.is_empty() || !self.is_connected() {
            return;
        }
        if let Err(e) = self.transport.unsubscribe_topics(removed).await {
            log::warn!("Unsubscribe from {:?} fail, {:?}", filters, e.to_string());
        }
    }

    /// Publishes when connected; while disconnected the message is
    /// dropped, there is no outbox.
    pub async fn publish<T, P>(&self, topic: T, payload: P, qos: QoS, retain: bool)
    where
        T: Into<ByteString>,
        P: Into<Bytes>,
    {
        let topic = topic.into();
        if !self.is_connected() {
            log::debug!("Not connected, publish to {:?} dropped", topic);
            return;
        }
        if let Err(e) = self.transport.publish(topic.clone(), payload.into(), qos, retain).await {
            log::warn!("Publish to {:?} fail, {:?}", topic, e.to_string());
        }
    }

    /// One delivery tick. While connected, drains the inbound queue and
    /// invokes every matching callback; on a lost connection flips back
    /// to disconnected; while disconnected starts a connect attempt if
    /// auto connect is enabled.
    ///
    /// Callbacks run outside the registry lock, so they may freely call
    /// back into this client.
    pub fn pump(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if self.is_connected() {
            if self.transport.is_connected() {
                for msg in self.queue.drain_all() {
                    let matched = self.subscriptions.read().matching(&msg.topic);
                    subscription::invoke_all(&matched, &msg);
                }
                return;
            }
            log::warn!("Connection to {:?} lost", self.cfg.server_addr());
            *self.state.write() = ConnectionState::Disconnected;
        }
        if self.cfg.auto_connect {
            self.try_connect();
        }
    }

    /// Permanently shuts the client down: disconnects, refuses further
    /// inbound messages and waits (bounded) for in-flight producer
    /// notifications to finish. Repeat calls are no-ops.
    pub async fn stop(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.disconnect().await;
        self.queue.close();
        self.queue.wait_idle(self.cfg.stop_drain_timeout).await?;
        Ok(())
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self.state(), ConnectionState::Connected)
    }

    #[inline]
    pub fn queue(&self) -> &InboundQueue {
        &self.queue
    }

    #[inline]
    pub fn subscriptions_len(&self) -> usize {
        self.subscriptions.read().len()
    }
}
