//! # sqsgate-core
//!
//! Core library behind the `sqsgate` HTTP facade for AWS SQS.
//!
//! The crate is split along the seam between *what* a consumer does with a
//! queue and *which* queue service answers:
//!
//! - **Backends**: [`QueueBackend`] (receive, delete, change visibility) and
//!   [`QueueAdmin`] (queue lifecycle and publishing), implemented for SQS by
//!   [`SqsQueues`] and in memory by [`memory::InMemoryQueues`].
//! - **Consumption**: the [`consume`] module implements the four consumption
//!   policies on top of any [`QueueBackend`].
//! - **Facade**: [`Gateway`] bundles a backend with a queue-name prefix and
//!   exposes the operations the HTTP layer serves.
//!
//! ## Example
//!
//! ```no_run
//! use sqsgate::{consume, Gateway, SqsQueues};
//!
//! # async fn example() -> Result<(), sqsgate::QueueError> {
//! let config = aws_config::from_env().load().await;
//! let gateway = Gateway::new(SqsQueues::from_config(config), "sqsgate-");
//!
//! let url = gateway.create_queue("orders").await?;
//! gateway.send_message(&url, "hello").await?;
//!
//! let consumed = gateway.consume(&url, consume::ConsumeMode::FetchAndDelete).await?;
//! for body in consumed.bodies {
//!     println!("{body}");
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod consume;
mod gateway;
pub mod memory;
mod policy;
mod send;
mod sqs;

#[cfg(test)]
mod test_utils;

pub use backend::*;
pub use gateway::*;
pub use policy::*;
pub use sqs::*;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue service could not be reached or rejected the call.
    Unavailable(String),
    /// The receipt handle expired, was superseded by a redelivery, or was already used.
    StaleReceiptHandle(String),
    QueueDoesNotExist(String),
    InvalidRequest(String),
}

impl QueueError {
    /// Short machine readable name, used as the `error` field of HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::Unavailable(_) => "BackendUnavailable",
            QueueError::StaleReceiptHandle(_) => "StaleReceiptHandle",
            QueueError::QueueDoesNotExist(_) => "QueueDoesNotExist",
            QueueError::InvalidRequest(_) => "InvalidRequest",
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Unavailable(msg) => write!(f, "queue backend unavailable: {}", msg),
            QueueError::StaleReceiptHandle(handle) => {
                write!(f, "receipt handle is no longer valid: {}", handle)
            }
            QueueError::QueueDoesNotExist(queue) => write!(f, "queue does not exist: {}", queue),
            QueueError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl std::error::Error for QueueError {}
