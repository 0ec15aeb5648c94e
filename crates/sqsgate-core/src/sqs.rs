//! SQS client wrapper implementing the backend traits.

use crate::{
    Message, QueueAdmin, QueueAttribute, QueueBackend, QueueError, WaitMode,
    MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use sqs::types::QueueAttributeName;

/// Messages requested per receive call. SQS caps this at 10.
pub const DEFAULT_MAX_MESSAGES: i32 = 10;

/// Receives messages from an SQS queue.
///
/// Retrieves up to `max_messages` messages. The per-call wait time is only
/// set for [`WaitMode::LongPoll`]; otherwise the queue's own
/// `ReceiveMessageWaitTimeSeconds` applies. The visibility timeout is left to
/// the queue's default.
///
/// # Errors
///
/// Returns [`QueueError::QueueDoesNotExist`] for an unknown queue and
/// [`QueueError::Unavailable`] for every other failure.
pub async fn receive(
    client: &sqs::Client,
    queue_url: &str,
    wait: WaitMode,
    max_messages: i32,
) -> Result<Vec<Message>, QueueError> {
    let wait_time_seconds = match wait {
        WaitMode::Immediate => None,
        WaitMode::LongPoll(seconds) => Some(seconds),
    };

    let output = client
        .receive_message()
        .queue_url(queue_url)
        .max_number_of_messages(max_messages)
        .set_wait_time_seconds(wait_time_seconds)
        .send()
        .await
        .map_err(|e| classify(e, queue_url))?;

    Ok(output
        .messages
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            let Some(receipt_handle) = m.receipt_handle else {
                log::warn!(
                    "skipping message {:?} from {} without a receipt handle",
                    m.message_id,
                    queue_url
                );
                return None;
            };
            Some(Message {
                message_id: m.message_id,
                body: m.body.unwrap_or_default(),
                receipt_handle,
            })
        })
        .collect())
}

/// Client for AWS SQS.
///
/// Cloning is cheap; the underlying SDK client pools connections and is safe
/// to share between concurrent requests.
///
/// # Example
///
/// ```no_run
/// use sqsgate::{QueueAdmin, SqsQueues};
///
/// # async fn example() {
/// let config = aws_config::from_env().load().await;
/// let queues = SqsQueues::from_config(config);
///
/// for url in queues.list_queues("sqsgate-").await.unwrap() {
///     println!("Found queue: {}", url);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct SqsQueues {
    /// The AWS SDK configuration used for SQS operations
    pub config: SdkConfig,
    /// The SQS client instance
    pub client: sqs::Client,
    /// Upper bound on messages per receive
    pub max_messages: i32,
}

impl SqsQueues {
    /// Creates the client from a pre-built AWS SDK config.
    ///
    /// The caller decides on credentials and endpoints (e.g. LocalStack with
    /// `--local`).
    pub fn from_config(config: SdkConfig) -> Self {
        let client = sqs::Client::new(&config);
        Self {
            config,
            client,
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }

    pub fn with_max_messages(mut self, max_messages: i32) -> Self {
        self.max_messages = max_messages.clamp(1, DEFAULT_MAX_MESSAGES);
        self
    }
}

#[async_trait]
impl QueueBackend for SqsQueues {
    async fn receive(&self, queue_url: &str, wait: WaitMode) -> Result<Vec<Message>, QueueError> {
        receive(&self.client, queue_url, wait, self.max_messages).await
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| classify_handle(e, receipt_handle))?;

        Ok(())
    }

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), QueueError> {
        // SQS answers InvalidParameterValue both for a bad timeout and for an
        // expired handle, so the range is checked here
        if !(0..=MAX_VISIBILITY_TIMEOUT_SECONDS).contains(&timeout_seconds) {
            return Err(QueueError::InvalidRequest(format!(
                "visibility timeout must be between 0 and {MAX_VISIBILITY_TIMEOUT_SECONDS} seconds, got {timeout_seconds}"
            )));
        }

        self.client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout_seconds)
            .send()
            .await
            .map_err(|e| classify_handle(e, receipt_handle))?;

        Ok(())
    }
}

#[async_trait]
impl QueueAdmin for SqsQueues {
    /// Handles pagination, returning all matching queues regardless of count.
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        let mut queues = Vec::new();

        let mut output = self
            .client
            .list_queues()
            .queue_name_prefix(prefix)
            .send()
            .await
            .map_err(|e| classify(e, prefix))?;
        loop {
            if let Some(mut list) = output.queue_urls {
                queues.append(&mut list);
            }

            let Some(token) = output.next_token else {
                break;
            };

            output = self
                .client
                .list_queues()
                .queue_name_prefix(prefix)
                .set_next_token(Some(token))
                .send()
                .await
                .map_err(|e| classify(e, prefix))?;
        }

        Ok(queues)
    }

    async fn queue_url(&self, name: &str) -> Result<String, QueueError> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        output
            .queue_url
            .ok_or_else(|| QueueError::QueueDoesNotExist(name.to_string()))
    }

    async fn create_queue(&self, name: &str) -> Result<String, QueueError> {
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify(e, name))?;

        output.queue_url.ok_or_else(|| {
            QueueError::Unavailable(format!("CreateQueue for {} returned no queue URL", name))
        })
    }

    async fn queue_arn(&self, queue_url: &str) -> Result<String, QueueError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| classify(e, queue_url))?;

        output
            .attributes
            .and_then(|mut attributes| attributes.remove(&QueueAttributeName::QueueArn))
            .ok_or_else(|| {
                QueueError::Unavailable(format!("no QueueArn attribute returned for {}", queue_url))
            })
    }

    async fn set_queue_attribute(
        &self,
        queue_url: &str,
        attribute: QueueAttribute,
    ) -> Result<(), QueueError> {
        let (name, value) = match attribute {
            QueueAttribute::RedrivePolicy(policy) => (
                QueueAttributeName::RedrivePolicy,
                serde_json::to_string(&policy).map_err(|e| {
                    QueueError::InvalidRequest(format!("unserializable redrive policy: {}", e))
                })?,
            ),
            QueueAttribute::ReceiveMessageWaitTimeSeconds(seconds) => (
                QueueAttributeName::ReceiveMessageWaitTimeSeconds,
                seconds.to_string(),
            ),
        };

        self.client
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(name, value)
            .send()
            .await
            .map_err(|e| classify(e, queue_url))?;

        Ok(())
    }

    async fn send_message(&self, queue_url: &str, body: &str) -> Result<Option<String>, QueueError> {
        self.send(queue_url, body).await
    }

    async fn delete_queue(&self, queue_url: &str) -> Result<(), QueueError> {
        self.client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(|e| classify(e, queue_url))?;

        Ok(())
    }
}

/// Maps an SDK failure onto [`QueueError`] by its SQS error code.
///
/// `subject` is the queue or name the call was about.
pub(crate) fn classify<E, R>(err: SdkError<E, R>, subject: &str) -> QueueError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    error_for_code(err.code(), subject)
        .unwrap_or_else(|| QueueError::Unavailable(DisplayErrorContext(&err).to_string()))
}

/// Like [`classify`], for calls that act on a receipt handle. Codes SQS uses
/// for an expired, superseded or already deleted delivery become
/// [`QueueError::StaleReceiptHandle`].
fn classify_handle<E, R>(err: SdkError<E, R>, receipt_handle: &str) -> QueueError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if is_stale_handle_code(err.code()) {
        QueueError::StaleReceiptHandle(receipt_handle.to_string())
    } else {
        classify(err, receipt_handle)
    }
}

fn is_stale_handle_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some(
            "ReceiptHandleIsInvalid"
                | "AWS.SimpleQueueService.MessageNotInflight"
                | "MessageNotInflight"
                | "InvalidParameterValue"
        )
    )
}

fn error_for_code(code: Option<&str>, subject: &str) -> Option<QueueError> {
    let code = code?;
    match code {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            Some(QueueError::QueueDoesNotExist(subject.to_string()))
        }
        "InvalidAttributeName" | "InvalidAttributeValue" | "QueueNameExists"
        | "InvalidParameterValue" => Some(QueueError::InvalidRequest(format!(
            "{} rejected: {}",
            subject, code
        ))),
        _ => None,
    }
}
