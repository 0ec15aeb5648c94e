//! The operations served over HTTP, on top of any [`QueueService`].

use crate::consume::{self, ConsumeMode, Consumed};
use crate::{
    QueueAdmin, QueueAttribute, QueueError, QueueService, RedrivePolicy,
    LONG_POLLING_QUEUE_WAIT_SECONDS,
};
use std::sync::Arc;

pub const DEFAULT_QUEUE_PREFIX: &str = "sqsgate-";

/// Name (after the prefix) of the dead-letter queue created by
/// [`Gateway::create_dead_letter_queue`].
pub const DEAD_LETTER_QUEUE_NAME: &str = "DLQ";

/// Queue operations scoped to a queue-name prefix.
///
/// Queues created through the gateway get the prefix prepended and
/// [`Gateway::list`] only returns queues carrying it. Everything else takes
/// a full queue URL. The gateway itself is stateless and cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    service: Arc<dyn QueueService>,
    prefix: String,
}

impl Gateway {
    pub fn new<S: QueueService + 'static>(service: S, prefix: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(service), prefix)
    }

    pub fn from_shared(service: Arc<dyn QueueService>, prefix: impl Into<String>) -> Self {
        Self {
            service,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub async fn list(&self) -> Result<Vec<String>, QueueError> {
        self.service.list_queues(&self.prefix).await
    }

    /// Looks up a queue by its exact name; the prefix is not added.
    pub async fn queue_url(&self, name: &str) -> Result<String, QueueError> {
        self.service.queue_url(name).await
    }

    pub async fn create_queue(&self, name: &str) -> Result<String, QueueError> {
        let queue_name = format!("{}{}", self.prefix, name);
        let url = self.service.create_queue(&queue_name).await?;
        log::info!("created queue {}", url);
        Ok(url)
    }

    /// Creates the shared dead-letter queue and points `queue_url`'s redrive
    /// policy at it. Returns the dead-letter queue's URL.
    pub async fn create_dead_letter_queue(&self, queue_url: &str) -> Result<String, QueueError> {
        let dlq_url = self.create_queue(DEAD_LETTER_QUEUE_NAME).await?;
        self.link_dead_letter_queue(queue_url, &dlq_url).await?;
        Ok(dlq_url)
    }

    pub async fn link_dead_letter_queue(
        &self,
        queue_url: &str,
        dlq_url: &str,
    ) -> Result<(), QueueError> {
        let arn = self.service.queue_arn(dlq_url).await?;
        let policy = RedrivePolicy::new(arn);
        log::info!(
            "linking {} to dead-letter queue {} after {} receives",
            queue_url,
            policy.dead_letter_target_arn,
            policy.max_receive_count
        );

        self.service
            .set_queue_attribute(queue_url, QueueAttribute::RedrivePolicy(policy))
            .await
    }

    /// Creates a queue whose receives wait up to
    /// [`LONG_POLLING_QUEUE_WAIT_SECONDS`] unless the caller says otherwise.
    pub async fn create_long_polling_queue(&self, name: &str) -> Result<String, QueueError> {
        let url = self.create_queue(name).await?;
        self.service
            .set_queue_attribute(
                &url,
                QueueAttribute::ReceiveMessageWaitTimeSeconds(LONG_POLLING_QUEUE_WAIT_SECONDS),
            )
            .await?;
        Ok(url)
    }

    pub async fn send_message(
        &self,
        queue_url: &str,
        content: &str,
    ) -> Result<Option<String>, QueueError> {
        self.service.send_message(queue_url, content).await
    }

    pub async fn consume(&self, queue_url: &str, mode: ConsumeMode) -> Result<Consumed, QueueError> {
        consume::consume(self.service.as_ref(), queue_url, mode).await
    }

    pub async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError> {
        self.service.delete_queue(queue_url).await?;
        log::info!("deleted queue {}", queue_url);
        Ok(())
    }
}
