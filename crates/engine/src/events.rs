use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriberError {
    #[error("subscriber is already handling an event")]
    Reentrant,
    #[error("subscriber rejected event: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u32,
    pub failed: Vec<SubscriptionId>,
}

impl DeliveryReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Subscription<S: ?Sized> {
    id: SubscriptionId,
    label: &'static str,
    subscriber: Box<S>,
}

/// Ordered subscriber list.
///
/// Delivery visits subscribers in registration order. A subscriber that fails is
/// logged and skipped; the remaining subscribers still receive the event.
pub struct EventHub<S: ?Sized> {
    next_id: u64,
    subscriptions: Vec<Subscription<S>>,
}

impl<S: ?Sized> Default for EventHub<S> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscriptions: Vec::new(),
        }
    }
}

impl<S: ?Sized> EventHub<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, label: &'static str, subscriber: Box<S>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.subscriptions.push(Subscription {
            id,
            label,
            subscriber,
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        self.subscriptions.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.subscriptions
            .iter()
            .map(|subscription| subscription.label)
    }

    pub fn deliver<F>(&mut self, event_name: &'static str, mut handler: F) -> DeliveryReport
    where
        F: FnMut(&mut S) -> Result<(), SubscriberError>,
    {
        let mut report = DeliveryReport::default();
        for subscription in &mut self.subscriptions {
            match handler(subscription.subscriber.as_mut()) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(error) => {
                    warn!(
                        event = event_name,
                        subscriber = subscription.label,
                        subscription_id = subscription.id.0,
                        error = %error,
                        "subscriber_failed"
                    );
                    report.failed.push(subscription.id);
                }
            }
        }
        report
    }
}
