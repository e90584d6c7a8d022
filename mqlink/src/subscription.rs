use std::sync::Arc;

use bytestring::ByteString;
use itertools::Itertools;

use crate::queue::InboundMessage;
use crate::topic::TopicFilter;

/// Callback invoked for every inbound message matching a subscribed filter.
pub trait OnMessageFn: 'static + Sync + Send + Fn(&InboundMessage) {}
impl<T> OnMessageFn for T where T: 'static + Sync + Send + Fn(&InboundMessage) {}

/// Callbacks are compared by `Arc` identity: the same clone subscribes and
/// unsubscribes, two separately created closures are never equal.
pub type MessageCallback = Arc<dyn OnMessageFn>;

/// Outcome of [`SubscriptionRegistry::remove`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct UnsubscribeStatus {
    /// The callback was registered under the filter and has been removed.
    pub was_found: bool,
    /// The entry lost its last callback and was deleted; the broker should
    /// be told to unsubscribe the filter.
    pub now_empty: bool,
}

struct SubscriptionEntry {
    filter: TopicFilter,
    callbacks: Vec<MessageCallback>,
}

/// Table of filter -> callback set, in first-subscribe order.
///
/// An entry exists if and only if its callback set is non-empty; removing
/// the last callback deletes the entry immediately. The matcher of an
/// entry is compiled once, when the filter string first appears.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers `callback` under `filter`. Returns true when the filter
    /// was not present before, i.e. the broker must be told about it.
    ///
    /// Adding the same callback clone twice is allowed and results in two
    /// invocations per matching message; no duplicate detection.
    pub fn add(&mut self, filter: &str, callback: MessageCallback) -> bool {
        if let Some(idx) = self.position(filter) {
            self.entries[idx].callbacks.push(callback);
            false
        } else {
            let entry =
                SubscriptionEntry { filter: TopicFilter::compile(filter), callbacks: vec![callback] };
            self.entries.push(entry);
            true
        }
    }

    /// Removes `callback` from the entry of `filter`, deleting the entry
    /// if it becomes empty. Unknown filters and unregistered callbacks
    /// report `was_found = false` and change nothing.
    pub fn remove(&mut self, filter: &str, callback: &MessageCallback) -> UnsubscribeStatus {
        let idx = match self.position(filter) {
            Some(idx) => idx,
            None => return UnsubscribeStatus::default(),
        };
        let entry = &mut self.entries[idx];
        let was_found = match entry.callbacks.iter().position(|cb| Arc::ptr_eq(cb, callback)) {
            Some(pos) => {
                entry.callbacks.remove(pos);
                true
            }
            None => false,
        };
        let now_empty = entry.callbacks.is_empty();
        if now_empty {
            self.entries.remove(idx);
        }
        UnsubscribeStatus { was_found, now_empty }
    }

    /// Every active filter string, for bulk resubscribe after a reconnect.
    #[inline]
    pub fn all_filters(&self) -> Vec<ByteString> {
        self.entries.iter().map(|e| e.filter.raw().clone()).collect_vec()
    }

    /// Clones of every callback whose filter matches `topic`, in entry
    /// order then callback insertion order. Callers invoke the result
    /// after releasing any registry lock, so callbacks are free to call
    /// back into the registry owner.
    pub fn matching(&self, topic: &str) -> Vec<MessageCallback> {
        self.entries
            .iter()
            .filter(|e| e.filter.matches(topic))
            .flat_map(|e| e.callbacks.iter().cloned())
            .collect_vec()
    }

    /// Evaluates every entry against the message topic and invokes the
    /// matching callbacks in place.
    #[inline]
    pub fn dispatch(&self, msg: &InboundMessage) {
        invoke_all(&self.matching(&msg.topic), msg);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn position(&self, filter: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.filter.as_str() == filter)
    }
}

/// Invokes each callback with the message, isolating panics so one failing
/// callback cannot stop delivery to the remaining ones.
pub(crate) fn invoke_all(callbacks: &[MessageCallback], msg: &InboundMessage) {
    for cb in callbacks {
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(msg))).is_err() {
            log::warn!("message callback panicked, topic: {}", msg.topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    fn counter() -> (MessageCallback, Arc<AtomicUsize>) {
        let n = Arc::new(AtomicUsize::new(0));
        let n2 = n.clone();
        let cb: MessageCallback = Arc::new(move |_msg: &InboundMessage| {
            n2.fetch_add(1, Ordering::SeqCst);
        });
        (cb, n)
    }

    fn msg(topic: &str) -> InboundMessage {
        InboundMessage::new(topic, "payload")
    }

    #[test]
    fn test_add_same_filter() {
        let mut reg = SubscriptionRegistry::new();
        let (cb1, n1) = counter();
        let (cb2, n2) = counter();

        assert!(reg.add("sport/tennis", cb1));
        assert!(!reg.add("sport/tennis", cb2));
        assert_eq!(reg.len(), 1);

        reg.dispatch(&msg("sport/tennis"));
        assert_eq!(n1.load(Ordering::SeqCst), 1);
        assert_eq!(n2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_callback() {
        let mut reg = SubscriptionRegistry::new();
        let (cb, n) = counter();

        assert!(reg.add("a/b", cb.clone()));
        assert!(!reg.add("a/b", cb));
        assert_eq!(reg.len(), 1);

        // two registrations of the same clone fire twice
        reg.dispatch(&msg("a/b"));
        assert_eq!(n.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_last_callback_deletes_entry() {
        let mut reg = SubscriptionRegistry::new();
        let (cb, n) = counter();

        reg.add("a/b", cb.clone());
        let st = reg.remove("a/b", &cb);
        assert_eq!(st, UnsubscribeStatus { was_found: true, now_empty: true });
        assert!(reg.is_empty());

        reg.dispatch(&msg("a/b"));
        assert_eq!(n.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_keeps_remaining() {
        let mut reg = SubscriptionRegistry::new();
        let (cb1, _n1) = counter();
        let (cb2, n2) = counter();

        reg.add("a/b", cb1.clone());
        reg.add("a/b", cb2);
        let st = reg.remove("a/b", &cb1);
        assert_eq!(st, UnsubscribeStatus { was_found: true, now_empty: false });
        assert_eq!(reg.len(), 1);

        reg.dispatch(&msg("a/b"));
        assert_eq!(n2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_unknown() {
        let mut reg = SubscriptionRegistry::new();
        let (cb1, _) = counter();
        let (cb2, _) = counter();

        let st = reg.remove("nope", &cb1);
        assert_eq!(st, UnsubscribeStatus { was_found: false, now_empty: false });

        // known filter, unregistered callback
        reg.add("a/b", cb1);
        let st = reg.remove("a/b", &cb2);
        assert_eq!(st, UnsubscribeStatus { was_found: false, now_empty: false });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_all_filters() {
        let mut reg = SubscriptionRegistry::new();
        let (cb, _) = counter();

        reg.add("a/b", cb.clone());
        reg.add("a/+", cb.clone());
        reg.add("a/#", cb.clone());
        reg.add("a/b", cb.clone());
        let filters = reg.all_filters().iter().map(|f| f.to_string()).collect::<Vec<_>>();
        assert_eq!(filters, vec!["a/b", "a/+", "a/#"]);
    }

    #[test]
    fn test_overlapping_filters_all_fire_in_order() {
        let mut reg = SubscriptionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["a/b", "a/+", "a/#", "x/y"] {
            let order = order.clone();
            let cb: MessageCallback = Arc::new(move |_msg: &InboundMessage| {
                order.lock().push(name);
            });
            reg.add(name, cb);
        }

        reg.dispatch(&msg("a/b"));
        assert_eq!(*order.lock(), vec!["a/b", "a/+", "a/#"]);
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let mut reg = SubscriptionRegistry::new();
        let (good, n) = counter();
        let bad: MessageCallback = Arc::new(|_msg: &InboundMessage| {
            panic!("boom");
        });

        reg.add("a/b", bad);
        reg.add("a/+", good);

        reg.dispatch(&msg("a/b"));
        assert_eq!(n.load(Ordering::SeqCst), 1);

        // registry still consistent afterwards
        assert_eq!(reg.len(), 2);
        reg.dispatch(&msg("a/b"));
        assert_eq!(n.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_callback_same_entry_is_isolated() {
        let mut reg = SubscriptionRegistry::new();
        let bad: MessageCallback = Arc::new(|_msg: &InboundMessage| {
            panic!("boom");
        });
        let (good, n) = counter();

        // both callbacks under one filter, the panicking one first
        reg.add("a/b", bad);
        reg.add("a/b", good);

        reg.dispatch(&msg("a/b"));
        assert_eq!(n.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matching_order() {
        let mut reg = SubscriptionRegistry::new();
        let (cb1, _) = counter();
        let (cb2, _) = counter();

        reg.add("a/#", cb1.clone());
        reg.add("b", cb2.clone());
        let hits = reg.matching("a/b/c");
        assert_eq!(hits.len(), 1);
        assert!(Arc::ptr_eq(&hits[0], &cb1));
        assert!(reg.matching("nope").is_empty());
    }
}
