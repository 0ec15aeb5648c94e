//! In-memory queue service with SQS-like delivery semantics.
//!
//! Used by the test suites and by `sqsgate serve --memory` for local work
//! without an AWS account. Behaviour that matters to consumers is modelled:
//! per-delivery receipt handles, visibility timeouts, long polling, and
//! redrive to a dead-letter queue. Time is `tokio::time`, so paused test
//! runtimes control expiry.

use crate::{
    Message, QueueAdmin, QueueAttribute, QueueBackend, QueueError, RedrivePolicy, WaitMode,
    MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const ACCOUNT_ID: &str = "000000000000";
const URL_BASE: &str = "http://sqs.memory.localhost";
const REGION: &str = "memory";

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_MESSAGES_PER_RECEIVE: usize = 10;
pub const MAX_WAIT_TIME_SECONDS: i32 = 20;

#[derive(Clone, Default)]
pub struct InMemoryQueues {
    inner: Arc<Inner>,
}

// One lock over every queue, so a redrive moves a message between two queues
// in a single step.
#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, MemoryQueue>>,
    arrivals: Notify,
}

struct MemoryQueue {
    messages: VecDeque<StoredMessage>,
    redrive: Option<RedrivePolicy>,
    receive_wait_seconds: i32,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            redrive: None,
            receive_wait_seconds: 0,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    /// Index of the message whose current delivery still owns `receipt_handle`.
    fn in_flight_position(&self, receipt_handle: &str, now: Instant) -> Option<usize> {
        self.messages.iter().position(|m| {
            m.delivery
                .as_ref()
                .is_some_and(|d| d.receipt_handle == receipt_handle && d.invisible_until > now)
        })
    }
}

struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    delivery: Option<Delivery>,
}

impl StoredMessage {
    fn hidden_until(&self, now: Instant) -> Option<Instant> {
        self.delivery
            .as_ref()
            .map(|d| d.invisible_until)
            .filter(|until| *until > now)
    }
}

struct Delivery {
    receipt_handle: String,
    invisible_until: Instant,
}

impl InMemoryQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_of(name: &str) -> String {
        format!("{URL_BASE}/{ACCOUNT_ID}/{name}")
    }

    pub fn arn_of(name: &str) -> String {
        format!("arn:aws:sqs:{REGION}:{ACCOUNT_ID}:{name}")
    }

    /// Messages stored in the queue, in flight or not. Zero for unknown queues.
    pub fn message_count(&self, queue_url: &str) -> usize {
        self.inspect(queue_url, |q, _| q.messages.len())
    }

    /// Messages currently hidden by a visibility timeout.
    pub fn in_flight_count(&self, queue_url: &str) -> usize {
        self.inspect(queue_url, |q, now| {
            q.messages
                .iter()
                .filter(|m| m.hidden_until(now).is_some())
                .count()
        })
    }

    fn inspect(&self, queue_url: &str, f: impl FnOnce(&MemoryQueue, Instant) -> usize) -> usize {
        let Some(name) = name_from_url(queue_url) else {
            return 0;
        };
        self.lock().get(name).map_or(0, |q| f(q, Instant::now()))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MemoryQueue>> {
        self.inner.queues.lock()
    }

    fn with_queue<T>(
        &self,
        queue_url: &str,
        f: impl FnOnce(&mut MemoryQueue) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        let name = name_from_url(queue_url)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?;
        let mut queues = self.lock();
        let queue = queues
            .get_mut(name)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?;
        f(queue)
    }

    /// Delivers up to [`MAX_MESSAGES_PER_RECEIVE`] visible messages.
    ///
    /// Also returns the earliest instant a hidden message becomes visible,
    /// so a long poll knows when to look again.
    fn deliver(&self, queue_url: &str) -> Result<(Vec<Message>, Option<Instant>), QueueError> {
        let name = name_from_url(queue_url)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?;
        let now = Instant::now();
        let mut queues = self.lock();

        let dead_letter = queues
            .get(name)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?
            .redrive
            .as_ref()
            .and_then(|p| Some((p.target_queue_name()?.to_string(), p.max_receive_count)))
            .filter(|(dlq, _)| queues.contains_key(dlq));

        let Some(queue) = queues.get_mut(name) else {
            return Err(QueueError::QueueDoesNotExist(queue_url.to_string()));
        };

        let mut delivered = Vec::new();
        let mut redriven = Vec::new();
        let mut next_visible: Option<Instant> = None;
        let mut i = 0;

        while i < queue.messages.len() && delivered.len() < MAX_MESSAGES_PER_RECEIVE {
            let stored = &mut queue.messages[i];

            if let Some(until) = stored.hidden_until(now) {
                next_visible = Some(next_visible.map_or(until, |t| t.min(until)));
                i += 1;
                continue;
            }

            if let Some((_, max_receive_count)) = &dead_letter {
                if stored.receive_count >= *max_receive_count {
                    if let Some(message) = queue.messages.remove(i) {
                        redriven.push(message);
                    }
                    continue;
                }
            }

            let receipt_handle = uuid::Uuid::new_v4().to_string();
            stored.receive_count += 1;
            stored.delivery = Some(Delivery {
                receipt_handle: receipt_handle.clone(),
                invisible_until: now + queue.visibility_timeout,
            });
            delivered.push(Message {
                message_id: Some(stored.message_id.clone()),
                body: stored.body.clone(),
                receipt_handle,
            });
            i += 1;
        }

        if let Some((dlq_name, _)) = dead_letter {
            if let Some(dlq) = queues.get_mut(&dlq_name) {
                for mut message in redriven {
                    log::debug!("moving message {} to {}", message.message_id, dlq_name);
                    message.receive_count = 0;
                    message.delivery = None;
                    dlq.messages.push_back(message);
                }
            }
        }

        Ok((delivered, next_visible))
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueues {
    async fn receive(&self, queue_url: &str, wait: WaitMode) -> Result<Vec<Message>, QueueError> {
        let wait_seconds = match wait {
            WaitMode::LongPoll(seconds) => seconds,
            WaitMode::Immediate => self.with_queue(queue_url, |q| Ok(q.receive_wait_seconds))?,
        };
        if !(0..=MAX_WAIT_TIME_SECONDS).contains(&wait_seconds) {
            return Err(QueueError::InvalidRequest(format!(
                "wait time must be between 0 and {MAX_WAIT_TIME_SECONDS} seconds, got {wait_seconds}"
            )));
        }
        let deadline = Instant::now() + Duration::from_secs(wait_seconds as u64);

        loop {
            // registered before looking, so a send in between still wakes us
            let arrival = self.inner.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let (messages, next_visible) = self.deliver(queue_url)?;
            if !messages.is_empty() || Instant::now() >= deadline {
                return Ok(messages);
            }

            let wake_at = next_visible.map_or(deadline, |t| t.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, arrival).await;
        }
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.with_queue(queue_url, |queue| {
            let position = queue
                .in_flight_position(receipt_handle, Instant::now())
                .ok_or_else(|| QueueError::StaleReceiptHandle(receipt_handle.to_string()))?;
            queue.messages.remove(position);
            Ok(())
        })
    }

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), QueueError> {
        if !(0..=MAX_VISIBILITY_TIMEOUT_SECONDS).contains(&timeout_seconds) {
            return Err(QueueError::InvalidRequest(format!(
                "visibility timeout must be between 0 and {MAX_VISIBILITY_TIMEOUT_SECONDS} seconds, got {timeout_seconds}"
            )));
        }

        let made_visible = self.with_queue(queue_url, |queue| {
            let now = Instant::now();
            let position = queue
                .in_flight_position(receipt_handle, now)
                .ok_or_else(|| QueueError::StaleReceiptHandle(receipt_handle.to_string()))?;
            let message = &mut queue.messages[position];
            if timeout_seconds == 0 {
                message.delivery = None;
            } else if let Some(delivery) = message.delivery.as_mut() {
                delivery.invisible_until = now + Duration::from_secs(timeout_seconds as u64);
            }
            Ok(timeout_seconds == 0)
        })?;

        if made_visible {
            self.inner.arrivals.notify_waiters();
        }
        Ok(())
    }
}

#[async_trait]
impl QueueAdmin for InMemoryQueues {
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        let mut names: Vec<_> = self
            .lock()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names.iter().map(|name| Self::url_of(name)).collect())
    }

    async fn queue_url(&self, name: &str) -> Result<String, QueueError> {
        if self.lock().contains_key(name) {
            Ok(Self::url_of(name))
        } else {
            Err(QueueError::QueueDoesNotExist(name.to_string()))
        }
    }

    async fn create_queue(&self, name: &str) -> Result<String, QueueError> {
        validate_queue_name(name)?;
        self.lock()
            .entry(name.to_string())
            .or_insert_with(MemoryQueue::new);
        Ok(Self::url_of(name))
    }

    async fn queue_arn(&self, queue_url: &str) -> Result<String, QueueError> {
        self.with_queue(queue_url, |_| Ok(()))?;
        let name = name_from_url(queue_url)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?;
        Ok(Self::arn_of(name))
    }

    async fn set_queue_attribute(
        &self,
        queue_url: &str,
        attribute: QueueAttribute,
    ) -> Result<(), QueueError> {
        if let QueueAttribute::RedrivePolicy(policy) = &attribute {
            let target = policy.target_queue_name().ok_or_else(|| {
                QueueError::InvalidRequest(format!(
                    "invalid dead-letter target ARN: {}",
                    policy.dead_letter_target_arn
                ))
            })?;
            if !self.lock().contains_key(target) {
                return Err(QueueError::InvalidRequest(format!(
                    "dead-letter target does not exist: {}",
                    policy.dead_letter_target_arn
                )));
            }
        }

        self.with_queue(queue_url, |queue| {
            match attribute {
                QueueAttribute::RedrivePolicy(policy) => queue.redrive = Some(policy),
                QueueAttribute::ReceiveMessageWaitTimeSeconds(seconds) => {
                    if !(0..=MAX_WAIT_TIME_SECONDS).contains(&seconds) {
                        return Err(QueueError::InvalidRequest(format!(
                            "ReceiveMessageWaitTimeSeconds must be between 0 and {MAX_WAIT_TIME_SECONDS}, got {seconds}"
                        )));
                    }
                    queue.receive_wait_seconds = seconds;
                }
            }
            Ok(())
        })
    }

    async fn send_message(&self, queue_url: &str, body: &str) -> Result<Option<String>, QueueError> {
        if body.is_empty() {
            return Err(QueueError::InvalidRequest(
                "message body must not be empty".to_string(),
            ));
        }

        let message_id = uuid::Uuid::new_v4().to_string();
        self.with_queue(queue_url, |queue| {
            queue.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: body.to_string(),
                receive_count: 0,
                delivery: None,
            });
            Ok(())
        })?;

        self.inner.arrivals.notify_waiters();
        Ok(Some(message_id))
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError> {
        let name = name_from_url(queue_url)
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))?;
        self.lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| QueueError::QueueDoesNotExist(queue_url.to_string()))
    }
}

fn name_from_url(queue_url: &str) -> Option<&str> {
    queue_url
        .strip_prefix(URL_BASE)?
        .strip_prefix('/')?
        .strip_prefix(ACCOUNT_ID)?
        .strip_prefix('/')
        .filter(|name| !name.is_empty())
}

/// Same rules SQS applies: 1 to 80 characters, alphanumeric, `-` or `_`,
/// with an optional `.fifo` suffix.
fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    let base = name.strip_suffix(".fifo").unwrap_or(name);
    if base.is_empty() {
        return Err(QueueError::InvalidRequest(
            "queue name cannot be empty".to_string(),
        ));
    }
    if name.len() > 80 {
        return Err(QueueError::InvalidRequest(format!(
            "queue name exceeds maximum length: {} > 80 characters",
            name.len()
        )));
    }
    if let Some(c) = base
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(QueueError::InvalidRequest(format!(
            "invalid character in queue name: '{}'. Allowed: alphanumeric, '-', '_'",
            c
        )));
    }
    Ok(())
}
