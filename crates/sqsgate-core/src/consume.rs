//! Message consumption policies.
//!
//! Every policy performs exactly one receive against the backend and then an
//! optional action per message. Nothing is kept between calls; hiding messages
//! from other consumers is entirely the backend's visibility timeout.
//!
//! A failing receive aborts the call. A failing delete or visibility change
//! only affects its own message: it is logged, recorded in
//! [`Consumed::failures`], and the remaining messages are still processed.
//! There are no retries.

use crate::{Message, QueueBackend, QueueError, WaitMode};

/// Visibility timeout applied by [`fetch_with_visibility_hold`].
pub const VISIBILITY_HOLD_SECONDS: i32 = 5;

/// Wait time used by [`fetch_with_long_poll_and_delete`].
pub const LONG_POLL_WAIT_SECONDS: i32 = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeMode {
    FetchOnly,
    FetchAndDelete,
    FetchWithVisibilityHold,
    FetchWithLongPollAndDelete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostAction {
    Delete,
    ChangeVisibility { timeout_seconds: i32 },
}

/// A delete or visibility change that failed for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostActionFailure {
    pub receipt_handle: String,
    pub action: PostAction,
    pub error: QueueError,
}

/// Outcome of one consumption call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Consumed {
    /// Bodies in the order the backend returned them.
    pub bodies: Vec<String>,
    pub failures: Vec<PostActionFailure>,
}

impl Consumed {
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

pub async fn consume<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
    mode: ConsumeMode,
) -> Result<Consumed, QueueError> {
    match mode {
        ConsumeMode::FetchOnly => fetch_only(backend, queue_url).await,
        ConsumeMode::FetchAndDelete => fetch_and_delete(backend, queue_url).await,
        ConsumeMode::FetchWithVisibilityHold => {
            fetch_with_visibility_hold(backend, queue_url).await
        }
        ConsumeMode::FetchWithLongPollAndDelete => {
            fetch_with_long_poll_and_delete(backend, queue_url).await
        }
    }
}

/// Returns every received body and leaves the messages in flight.
///
/// They become visible again once the queue's default visibility timeout
/// expires.
pub async fn fetch_only<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
) -> Result<Consumed, QueueError> {
    let messages = backend.receive(queue_url, WaitMode::Immediate).await?;

    Ok(Consumed {
        bodies: messages.into_iter().map(|m| m.body).collect(),
        failures: Vec::new(),
    })
}

/// Returns every received body and deletes each message by its receipt handle.
pub async fn fetch_and_delete<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
) -> Result<Consumed, QueueError> {
    let messages = backend.receive(queue_url, WaitMode::Immediate).await?;
    Ok(delete_each(backend, queue_url, messages).await)
}

/// Holds the first received message for [`VISIBILITY_HOLD_SECONDS`] and returns
/// only its body. Nothing is deleted.
///
/// Any other messages from the same receive are left alone and keep the
/// visibility timeout the backend gave them on delivery.
pub async fn fetch_with_visibility_hold<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
) -> Result<Consumed, QueueError> {
    let messages = backend.receive(queue_url, WaitMode::Immediate).await?;

    let Some(first) = messages.into_iter().next() else {
        return Ok(Consumed::default());
    };

    let action = PostAction::ChangeVisibility {
        timeout_seconds: VISIBILITY_HOLD_SECONDS,
    };
    let failures = match backend
        .change_visibility(queue_url, &first.receipt_handle, VISIBILITY_HOLD_SECONDS)
        .await
    {
        Ok(()) => Vec::new(),
        Err(error) => vec![failure(queue_url, first.receipt_handle, action, error)],
    };

    Ok(Consumed {
        bodies: vec![first.body],
        failures,
    })
}

/// Like [`fetch_and_delete`], but the receive waits up to
/// [`LONG_POLL_WAIT_SECONDS`] for a message instead of returning at once.
pub async fn fetch_with_long_poll_and_delete<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
) -> Result<Consumed, QueueError> {
    let messages = backend
        .receive(queue_url, WaitMode::LongPoll(LONG_POLL_WAIT_SECONDS))
        .await?;
    Ok(delete_each(backend, queue_url, messages).await)
}

async fn delete_each<B: QueueBackend + ?Sized>(
    backend: &B,
    queue_url: &str,
    messages: Vec<Message>,
) -> Consumed {
    let mut consumed = Consumed {
        bodies: Vec::with_capacity(messages.len()),
        failures: Vec::new(),
    };

    for message in messages {
        if let Err(error) = backend.delete(queue_url, &message.receipt_handle).await {
            consumed.failures.push(failure(
                queue_url,
                message.receipt_handle,
                PostAction::Delete,
                error,
            ));
        }
        consumed.bodies.push(message.body);
    }

    consumed
}

fn failure(
    queue_url: &str,
    receipt_handle: String,
    action: PostAction,
    error: QueueError,
) -> PostActionFailure {
    log::warn!(
        "{:?} failed on {} for receipt handle {}: {}",
        action,
        queue_url,
        receipt_handle,
        error
    );
    PostActionFailure {
        receipt_handle,
        action,
        error,
    }
}
