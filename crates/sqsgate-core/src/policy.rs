//! Queue attributes the gateway knows how to set.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of failed receives after which SQS moves a message to the dead-letter queue.
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;

/// Queue-level long-poll wait applied by `create_long_polling_queue`.
pub const LONG_POLLING_QUEUE_WAIT_SECONDS: i32 = 20;

/// SQS redrive policy, serialized the way the `RedrivePolicy` attribute expects:
///
/// ```json
/// {"deadLetterTargetArn":"arn:aws:sqs:eu-central-1:123456789012:sqsgate-DLQ","maxReceiveCount":"3"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    pub dead_letter_target_arn: String,
    #[serde(serialize_with = "as_string", deserialize_with = "string_or_number")]
    pub max_receive_count: u32,
}

impl RedrivePolicy {
    pub fn new(dead_letter_target_arn: impl Into<String>) -> Self {
        Self {
            dead_letter_target_arn: dead_letter_target_arn.into(),
            max_receive_count: DEFAULT_MAX_RECEIVE_COUNT,
        }
    }

    /// Queue name at the end of the target ARN.
    pub fn target_queue_name(&self) -> Option<&str> {
        self.dead_letter_target_arn
            .rsplit(':')
            .next()
            .filter(|name| !name.is_empty())
    }
}

fn as_string<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u32),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueueAttribute {
    RedrivePolicy(RedrivePolicy),
    ReceiveMessageWaitTimeSeconds(i32),
}
