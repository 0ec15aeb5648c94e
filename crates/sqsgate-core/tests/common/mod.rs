use async_trait::async_trait;
use parking_lot::Mutex;
use sqsgate::{Message, QueueBackend, QueueError, WaitMode};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Receive(WaitMode),
    Delete(String),
    ChangeVisibility(String, i32),
}

/// Backend that answers every receive with a fixed batch and records each call.
pub struct ScriptedBackend {
    batch: Vec<Message>,
    receive_error: Option<QueueError>,
    failing_handles: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn with_bodies<S: AsRef<str>>(bodies: &[S]) -> Self {
        let batch = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Message::new(body.as_ref(), receipt_handle(i)))
            .collect();

        Self {
            batch,
            receive_error: None,
            failing_handles: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::with_bodies::<&str>(&[])
    }

    pub fn failing_receive(error: QueueError) -> Self {
        Self {
            receive_error: Some(error),
            ..Self::empty()
        }
    }

    /// Post actions on the message at `index` fail as if its handle had expired.
    pub fn fail_post_action_for(mut self, index: usize) -> Self {
        self.failing_handles.insert(receipt_handle(index));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(handle) => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn visibility_changes(&self) -> Vec<(String, i32)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ChangeVisibility(handle, timeout) => Some((handle, timeout)),
                _ => None,
            })
            .collect()
    }

    pub fn receives(&self) -> Vec<WaitMode> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Receive(wait) => Some(wait),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn post_action(&self, receipt_handle: &str) -> Result<(), QueueError> {
        if self.failing_handles.contains(receipt_handle) {
            Err(QueueError::StaleReceiptHandle(receipt_handle.to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn receipt_handle(index: usize) -> String {
    format!("receipt-{index}")
}

#[async_trait]
impl QueueBackend for ScriptedBackend {
    async fn receive(&self, _queue_url: &str, wait: WaitMode) -> Result<Vec<Message>, QueueError> {
        self.record(Call::Receive(wait));
        match &self.receive_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.batch.clone()),
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.record(Call::Delete(receipt_handle.to_string()));
        self.post_action(receipt_handle)
    }

    async fn change_visibility(
        &self,
        _queue_url: &str,
        receipt_handle: &str,
        timeout_seconds: i32,
    ) -> Result<(), QueueError> {
        self.record(Call::ChangeVisibility(
            receipt_handle.to_string(),
            timeout_seconds,
        ));
        self.post_action(receipt_handle)
    }
}
