//! In-process outbox queues for side effects
//!
//! Provides:
//! - `Outbox`: a bounded, non-blocking send side (at-most-once; full or closed
//!   outboxes drop the message, log it and bump a metric)
//! - `MessageHandler` + `spawn_dispatcher`: a consumer task that retries each
//!   message with exponential backoff until it succeeds or the retry window ends
//! - Message types for activities, domain events and notifications

mod handlers;

pub use handlers::{ActivityRecorder, LogHandler, WebhookHandler};

use crate::errors::Result;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Send side of a bounded in-process queue
#[derive(Debug)]
pub struct Outbox<M> {
    name: &'static str,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Outbox<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<M: Debug + Send + 'static> Outbox<M> {
    /// Create an outbox and the receiver its dispatcher consumes
    pub fn channel(name: &'static str, capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { name, tx }, rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue without waiting. Never fails the caller.
    pub fn send(&self, message: M) {
        match self.tx.try_send(message) {
            Ok(()) => {
                crate::metrics::record_queue_send(self.name, true);
                debug!(queue = self.name, "Message enqueued");
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                crate::metrics::record_queue_send(self.name, false);
                warn!(queue = self.name, message = ?message, "Outbox full, message dropped");
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                crate::metrics::record_queue_send(self.name, false);
                warn!(queue = self.name, message = ?message, "Outbox closed, message dropped");
            }
        }
    }
}

/// Consumer of one message type
#[async_trait]
pub trait MessageHandler<M>: Send + Sync {
    async fn handle(&self, message: &M) -> Result<()>;
}

/// Drain `rx` into `handler`, retrying each message for at most `max_elapsed`
pub fn spawn_dispatcher<M, H>(
    name: &'static str,
    mut rx: mpsc::Receiver<M>,
    handler: Arc<H>,
    max_elapsed: Duration,
) -> JoinHandle<()>
where
    M: Debug + Send + Sync + 'static,
    H: MessageHandler<M> + ?Sized + 'static,
{
    tokio::spawn(async move {
        info!(queue = name, "Dispatcher started");
        while let Some(message) = rx.recv().await {
            let policy = ExponentialBackoff {
                max_elapsed_time: Some(max_elapsed),
                ..Default::default()
            };
            let handler = handler.as_ref();
            let msg = &message;
            let outcome = retry(policy, || async move {
                handler.handle(msg).await.map_err(|e| {
                    warn!(queue = name, error = %e, "Message handling failed, retrying");
                    backoff::Error::transient(e)
                })
            })
            .await;

            match outcome {
                Ok(()) => crate::metrics::record_queue_delivery(name, true),
                Err(e) => {
                    crate::metrics::record_queue_delivery(name, false);
                    error!(queue = name, error = %e, message = ?message, "Message abandoned");
                }
            }
        }
        info!(queue = name, "Dispatcher stopped");
    })
}

// ============================================================================
// Messages
// ============================================================================

/// A user-visible activity on an object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityMsg {
    pub user_id: String,
    #[serde(default)]
    pub trigger_user_id: Option<String>,
    pub object_id: String,
    pub original_object_id: String,
    /// e.g. `quote.closed`
    pub activity_type: String,
    #[serde(default)]
    pub revision_id: Option<String>,
}

/// Domain event for downstream consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMsg {
    /// e.g. `quote.create`
    pub event_type: String,
    pub user_id: String,
    /// Object the event is about (the content id)
    pub target_id: String,
    pub object_id: String,
    pub object_user_id: String,
}

/// Inbox notification for a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMsg {
    pub object_id: String,
    pub object_type: String,
    pub receiver_user_id: String,
    pub trigger_user_id: String,
    pub action: String,
}

/// Announcement of newly published content to external subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalNotificationMsg {
    pub object_id: String,
    pub title: String,
    pub user_id: String,
    pub tags: Vec<String>,
}

/// Outboxes used by the services
#[derive(Debug, Clone)]
pub struct Queues {
    pub activity: Outbox<ActivityMsg>,
    pub event: Outbox<EventMsg>,
    pub notification: Outbox<NotificationMsg>,
    pub external: Outbox<ExternalNotificationMsg>,
}

/// Receivers matching [`Queues`], handed to the dispatchers
#[derive(Debug)]
pub struct QueueReceivers {
    pub activity: mpsc::Receiver<ActivityMsg>,
    pub event: mpsc::Receiver<EventMsg>,
    pub notification: mpsc::Receiver<NotificationMsg>,
    pub external: mpsc::Receiver<ExternalNotificationMsg>,
}

impl Queues {
    pub fn new(capacity: usize) -> (Self, QueueReceivers) {
        let (activity, activity_rx) = Outbox::channel("activity", capacity);
        let (event, event_rx) = Outbox::channel("event", capacity);
        let (notification, notification_rx) = Outbox::channel("notification", capacity);
        let (external, external_rx) = Outbox::channel("external_notification", capacity);
        (
            Self {
                activity,
                event,
                notification,
                external,
            },
            QueueReceivers {
                activity: activity_rx,
                event: event_rx,
                notification: notification_rx,
                external: external_rx,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_send_drops_when_full() {
        let (outbox, mut rx) = Outbox::<EventMsg>::channel("test", 1);
        outbox.send(EventMsg {
            event_type: "quote.create".into(),
            ..Default::default()
        });
        // second message is dropped, not blocking
        outbox.send(EventMsg {
            event_type: "quote.update".into(),
            ..Default::default()
        });
        assert_eq!(rx.try_recv().unwrap().event_type, "quote.create");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_close_does_not_panic() {
        let (outbox, rx) = Outbox::<EventMsg>::channel("test", 4);
        drop(rx);
        outbox.send(EventMsg::default());
    }

    struct FlakyHandler {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl MessageHandler<ActivityMsg> for FlakyHandler {
        async fn handle(&self, _message: &ActivityMsg) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(AppError::QueueError {
                    message: "temporarily unavailable".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_dispatcher_retries_until_success() {
        let (outbox, rx) = Outbox::channel("activity", 8);
        let handler = Arc::new(FlakyHandler {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let task = spawn_dispatcher("activity", rx, handler.clone(), Duration::from_secs(10));

        outbox.send(ActivityMsg {
            activity_type: "quote.asked".into(),
            ..Default::default()
        });
        drop(outbox);
        task.await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }
}
