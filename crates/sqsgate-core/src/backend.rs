//! Capabilities a queue service has to provide.

use crate::{QueueAttribute, QueueError};
use async_trait::async_trait;

/// Longest visibility timeout SQS accepts, 12 hours.
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i32 = 43_200;

/// One delivery of a message.
///
/// The receipt handle identifies this delivery, not the message: a redelivery
/// of the same message carries a new handle and the old one goes stale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub message_id: Option<String>,
    pub body: String,
    pub receipt_handle: String,
}

impl Message {
    pub fn new(body: impl Into<String>, receipt_handle: impl Into<String>) -> Self {
        Self {
            message_id: None,
            body: body.into(),
            receipt_handle: receipt_handle.into(),
        }
    }
}

/// How long a receive call may wait for at least one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitMode {
    /// No per-call wait time; the backend answers as soon as it can.
    Immediate,
    /// Wait up to the given number of seconds for a message to arrive.
    LongPoll(i32),
}

/// Message-level operations used by the consumption policies.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Receives zero or more messages. An empty vector is not an error.
    async fn receive(&self, queue_url: &str, wait: WaitMode) -> Result<Vec<Message>, QueueError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;

    /// Hides the delivery identified by `receipt_handle` for `timeout_seconds`
    /// from now. Zero makes it visible again immediately.
    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), QueueError>;
}

/// Queue lifecycle and publishing.
#[async_trait]
pub trait QueueAdmin: Send + Sync {
    /// Lists the URLs of every queue whose name starts with `prefix`.
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError>;

    async fn queue_url(&self, name: &str) -> Result<String, QueueError>;

    /// Creates a queue (or returns the existing one) and returns its URL.
    async fn create_queue(&self, name: &str) -> Result<String, QueueError>;

    async fn queue_arn(&self, queue_url: &str) -> Result<String, QueueError>;

    async fn set_queue_attribute(
        &self,
        queue_url: &str,
        attribute: QueueAttribute,
    ) -> Result<(), QueueError>;

    /// Publishes `body` and returns the message id assigned by the backend, if any.
    async fn send_message(&self, queue_url: &str, body: &str) -> Result<Option<String>, QueueError>;

    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError>;
}

/// A backend that supports both message and queue operations.
pub trait QueueService: QueueBackend + QueueAdmin {}

impl<T: QueueBackend + QueueAdmin + ?Sized> QueueService for T {}
