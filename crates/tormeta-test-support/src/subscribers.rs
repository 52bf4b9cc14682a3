//! Subscribers for registry and broadcaster tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tormeta_events::{Frame, Subscriber, SubscriberError};

/// Keeps every delivered frame.
#[derive(Default)]
pub struct RecordingSubscriber {
    frames: Mutex<Vec<Frame>>,
}

impl RecordingSubscriber {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered frames as text.
    #[must_use]
    pub fn frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|frame| frame.as_str().to_string())
            .collect()
    }

    /// Number of delivered frames.
    #[must_use]
    pub fn count(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    async fn deliver(&self, frame: Frame) -> Result<(), SubscriberError> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
        Ok(())
    }
}

/// Rejects every frame as if its connection had closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingSubscriber;

#[async_trait]
impl Subscriber for FailingSubscriber {
    async fn deliver(&self, _frame: Frame) -> Result<(), SubscriberError> {
        Err(SubscriberError::Closed)
    }
}
