//! Subscriber seam used by the registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::error::SubscriberError;
use crate::payloads::Frame;

/// Anything that can accept encoded live-feed frames.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver one frame.
    ///
    /// # Errors
    ///
    /// Returns a [`SubscriberError`] when the subscriber can no longer accept frames.
    async fn deliver(&self, frame: Frame) -> Result<(), SubscriberError>;
}

/// Subscriber backed by a bounded channel drained by a transport writer task.
#[derive(Debug)]
pub struct ChannelSubscriber {
    sender: mpsc::Sender<Frame>,
    send_timeout: Duration,
}

impl ChannelSubscriber {
    /// Build a subscriber together with the receiver its writer task drains.
    #[must_use]
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Arc::new(Self {
                sender,
                send_timeout,
            }),
            receiver,
        )
    }

    /// Queue a frame without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Closed`] if the receiver is gone and
    /// [`SubscriberError::TimedOut`] if the buffer is full.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), SubscriberError> {
        self.sender.try_send(frame).map_err(|err| match err {
            TrySendError::Closed(_) => SubscriberError::Closed,
            TrySendError::Full(_) => SubscriberError::TimedOut {
                after: Duration::ZERO,
            },
        })
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn deliver(&self, frame: Frame) -> Result<(), SubscriberError> {
        self.sender
            .send_timeout(frame, self.send_timeout)
            .await
            .map_err(|err| match err {
                SendTimeoutError::Closed(_) => SubscriberError::Closed,
                SendTimeoutError::Timeout(_) => SubscriberError::TimedOut {
                    after: self.send_timeout,
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_subscriber_forwards_frames() {
        let (subscriber, mut receiver) = ChannelSubscriber::channel(4, Duration::from_millis(50));
        assert!(subscriber.deliver(Frame::ping()).await.is_ok());
        assert_eq!(receiver.recv().await, Some(Frame::ping()));
    }

    #[tokio::test]
    async fn channel_subscriber_reports_closed_receiver() {
        let (subscriber, receiver) = ChannelSubscriber::channel(1, Duration::from_millis(50));
        drop(receiver);
        assert_eq!(
            subscriber.deliver(Frame::ping()).await,
            Err(SubscriberError::Closed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn channel_subscriber_times_out_when_full() {
        let (subscriber, _receiver) = ChannelSubscriber::channel(1, Duration::from_millis(50));
        assert!(subscriber.try_deliver(Frame::ping()).is_ok());
        assert_eq!(
            subscriber.deliver(Frame::ping()).await,
            Err(SubscriberError::TimedOut {
                after: Duration::from_millis(50)
            })
        );
    }
}
