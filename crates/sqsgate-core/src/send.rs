use crate::sqs::classify;
use crate::{QueueError, SqsQueues};

impl SqsQueues {
    /// Publishes a single message and returns the id SQS assigned to it.
    pub async fn send(
        &self,
        queue_url: &str,
        body: impl Into<String>,
    ) -> Result<Option<String>, QueueError> {
        let body = body.into();

        // SQS rejects empty bodies with a generic validation error
        if body.is_empty() {
            return Err(QueueError::InvalidRequest(
                "message body must not be empty".to_string(),
            ));
        }

        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| classify(e, queue_url))?;

        Ok(output.message_id)
    }
}
