//! Queue Service Client

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::factory::ClientHandle;
use crate::error::HarnessResult;

#[derive(Clone, Debug)]
pub struct QueueClient {
    handle: ClientHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    pub url: String,
}

#[derive(Serialize, Debug)]
struct CreateQueueRequest<'a> {
    name: &'a str,
    fifo: bool,
}

#[derive(Serialize, Debug)]
struct SendMessageRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: String,
    pub md5_of_body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub receipt_handle: String,
}

#[derive(Deserialize, Debug)]
struct ReceiveMessageResponse {
    messages: Vec<Message>,
}

#[derive(Deserialize, Debug)]
struct ListQueuesResponse {
    queues: Vec<QueueInfo>,
}

impl QueueClient {
    pub fn new(handle: ClientHandle) -> Self {
        Self { handle }
    }

    /// Create a queue. Names ending in `.fifo` create a FIFO queue.
    pub async fn create_queue(&self, name: &str) -> HarnessResult<QueueInfo> {
        let fifo = name.ends_with(".fifo");
        self.handle
            .post_json("/queues", &CreateQueueRequest { name, fifo })
            .await
    }

    pub async fn list_queues(&self) -> HarnessResult<Vec<QueueInfo>> {
        let response: ListQueuesResponse = self.handle.get_json("/queues").await?;
        Ok(response.queues)
    }

    pub async fn send_message(&self, queue: &str, body: &str) -> HarnessResult<SendMessageResponse> {
        self.handle
            .post_json(&format!("/queues/{queue}/messages"), &SendMessageRequest { body })
            .await
    }

    /// Receive up to `max_messages`, long-polling for up to `wait`.
    pub async fn receive_messages(
        &self,
        queue: &str,
        max_messages: u32,
        wait: Duration,
    ) -> HarnessResult<Vec<Message>> {
        let path = format!(
            "/queues/{queue}/messages?max={max_messages}&wait_secs={}",
            wait.as_secs()
        );
        let response: ReceiveMessageResponse = self.handle.get_json(&path).await?;
        Ok(response.messages)
    }

    pub async fn delete_queue(&self, queue: &str) -> HarnessResult<()> {
        self.handle.delete(&format!("/queues/{queue}")).await
    }
}
