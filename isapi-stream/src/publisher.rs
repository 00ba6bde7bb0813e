//! Delivery of signals to the consumer.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::event::Signal;

/// Receives every signal a connector produces, in order.
///
/// `publish` is awaited by the connector task before it reads the next
/// frame, so a slow publisher applies backpressure to the stream.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, signal: Signal);
}

/// Publishes into a bounded tokio channel.
///
/// Waits for capacity instead of dropping, so nothing is lost while the
/// receiver is alive. Once the receiver is gone further signals are
/// discarded.
pub struct ChannelPublisher {
    sender: mpsc::Sender<Signal>,
    closed: AtomicBool,
}

impl ChannelPublisher {
    pub fn new(sender: mpsc::Sender<Signal>) -> Self {
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    /// Create a publisher and the receiver that reads from it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Signal>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, signal: Signal) {
        if self.sender.send(signal).await.is_err() && !self.closed.swap(true, Ordering::Relaxed) {
            warn!("Signal receiver dropped, discarding further signals");
        }
    }
}

/// Publishes by calling a closure.
pub struct CallbackPublisher<F>
where
    F: Fn(Signal) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackPublisher<F>
where
    F: Fn(Signal) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> EventPublisher for CallbackPublisher<F>
where
    F: Fn(Signal) + Send + Sync,
{
    async fn publish(&self, signal: Signal) {
        (self.callback)(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalEvent;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_channel_publisher_preserves_order() {
        let (publisher, mut rx) = ChannelPublisher::channel(1);

        let producer = tokio::spawn(async move {
            publisher.publish(Signal::Connected).await;
            publisher
                .publish(CanonicalEvent::start("VideoMotion", 1).into())
                .await;
            publisher
                .publish(CanonicalEvent::stop("VideoMotion", 1).into())
                .await;
        });

        assert_eq!(rx.recv().await, Some(Signal::Connected));
        assert_eq!(
            rx.recv().await,
            Some(Signal::Alarm(CanonicalEvent::start("VideoMotion", 1)))
        );
        assert_eq!(
            rx.recv().await,
            Some(Signal::Alarm(CanonicalEvent::stop("VideoMotion", 1)))
        );
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_publisher_after_receiver_dropped() {
        let (publisher, rx) = ChannelPublisher::channel(4);
        drop(rx);

        publisher.publish(Signal::Connected).await;
        publisher.publish(Signal::Disconnected).await;
        assert!(publisher.closed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_callback_publisher() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let publisher = CallbackPublisher::new(move |signal| sink.lock().unwrap().push(signal));

        tokio_test::block_on(async {
            publisher.publish(Signal::Connected).await;
            publisher.publish(Signal::error("boom")).await;
        });

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![Signal::Connected, Signal::error("boom")]);
    }
}
