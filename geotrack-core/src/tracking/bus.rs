//! Shared outward event stream.
//!
//! Both query sessions publish into one stream. Every subscriber owns an
//! unbounded queue, so a slow consumer never loses events; it only holds
//! them in memory until drained. Ordering is preserved per tracked kind; no
//! ordering is promised between kinds.

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::trace;

use geotrack_model::GeoEvent;

/// Handle to the multiplexer's single outward event channel.
///
/// Every `track_*` call hands back a clone of the same handle. The first
/// call to [`EventStream::subscribe`] receives everything published since the
/// multiplexer was built; later subscribers start at the moment they
/// subscribe. Until that first call, published events are held for it.
#[derive(Clone)]
pub struct EventStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    subscribers: Mutex<Vec<UnboundedSender<GeoEvent>>>,
    primary: Mutex<Option<UnboundedReceiver<GeoEvent>>>,
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("subscribers", &self.subscriber_count())
            .field("primary_taken", &self.inner.primary.lock().is_none())
            .finish()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStream {
    pub fn new() -> Self {
        let (sender, primary) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(StreamInner {
                subscribers: Mutex::new(vec![sender]),
                primary: Mutex::new(Some(primary)),
            }),
        }
    }

    pub fn subscribe(&self) -> GeoEventReceiver {
        if let Some(receiver) = self.inner.primary.lock().take() {
            return GeoEventReceiver { receiver };
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(sender);
        GeoEventReceiver { receiver }
    }

    /// True when both handles refer to the same underlying channel.
    pub fn same_stream(&self, other: &EventStream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Receivers still attached, counting the primary one until it is dropped.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|sender| !sender.is_closed())
            .count()
    }

    pub(crate) fn publish(&self, event: GeoEvent) {
        let mut subscribers = self.inner.subscribers.lock();
        // Dropped receivers are pruned; with none left the event is unobserved.
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            trace!("geo event published with no subscribers");
        }
    }
}

/// Consumer side of an [`EventStream`].
pub struct GeoEventReceiver {
    receiver: UnboundedReceiver<GeoEvent>,
}

impl fmt::Debug for GeoEventReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoEventReceiver")
            .field("pending", &self.receiver.len())
            .finish()
    }
}

impl GeoEventReceiver {
    /// Waits for the next event. Returns `None` once the multiplexer is gone.
    pub async fn recv(&mut self) -> Option<GeoEvent> {
        self.receiver.recv().await
    }

    /// Returns the next already-published event without waiting.
    pub fn try_recv(&mut self) -> Option<GeoEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drains every event published so far.
    pub fn drain(&mut self) -> Vec<GeoEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_stream(self) -> impl Stream<Item = GeoEvent> + Send + 'static {
        UnboundedReceiverStream::new(self.receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use geotrack_model::{GeoEventPayload, TrackedKind};

    fn ready(kind: TrackedKind) -> GeoEvent {
        GeoEvent::new(kind, GeoEventPayload::Ready)
    }

    #[test]
    fn first_subscriber_sees_events_published_before_subscribing() {
        let stream = EventStream::new();
        stream.publish(ready(TrackedKind::Worker));

        let mut first = stream.subscribe();
        let mut second = stream.subscribe();
        stream.publish(ready(TrackedKind::Assignment));

        assert_eq!(
            first.drain(),
            vec![ready(TrackedKind::Worker), ready(TrackedKind::Assignment)]
        );
        assert_eq!(second.drain(), vec![ready(TrackedKind::Assignment)]);
    }

    #[test]
    fn slow_subscriber_keeps_every_event() {
        let stream = EventStream::new();
        let mut receiver = stream.subscribe();
        for _ in 0..10_000 {
            stream.publish(ready(TrackedKind::Worker));
        }
        stream.publish(ready(TrackedKind::Assignment));

        let drained = receiver.drain();
        assert_eq!(drained.len(), 10_001);
        assert_eq!(drained[10_000], ready(TrackedKind::Assignment));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let stream = EventStream::new();
        let first = stream.subscribe();
        let second = stream.subscribe();
        assert_eq!(stream.subscriber_count(), 2);

        drop(first);
        stream.publish(ready(TrackedKind::Worker));
        assert_eq!(stream.subscriber_count(), 1);
        drop(second);
        stream.publish(ready(TrackedKind::Worker));
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn stream_adapter_yields_published_events() {
        let stream = EventStream::new();
        let receiver = stream.subscribe();
        stream.publish(ready(TrackedKind::Worker));
        drop(stream);

        let collected: Vec<_> = receiver.into_stream().collect().await;
        assert_eq!(collected, vec![ready(TrackedKind::Worker)]);
    }
}
