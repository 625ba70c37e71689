// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client;
use tracing::warn;

use super::call_failure;
use crate::clients::{QueueClient, QueueMessage};
use crate::poll::WaitTime;
use crate::retry::CallFailure;

#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
}

impl SqsQueue {
    pub fn new(config: &SdkConfig) -> Self {
        SqsQueue {
            client: Client::new(config),
        }
    }
}

fn into_queue_message(message: Message) -> Option<QueueMessage> {
    let Some(receipt_handle) = message.receipt_handle else {
        warn!(
            "Skipping SQS message {:?} without a receipt handle",
            message.message_id
        );
        return None;
    };
    Some(QueueMessage {
        message_id: message.message_id.unwrap_or_default(),
        receipt_handle,
        body: message.body.unwrap_or_default(),
    })
}

#[async_trait]
impl QueueClient for SqsQueue {
    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait: WaitTime,
    ) -> Result<Vec<QueueMessage>, CallFailure> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait.as_secs())
            .send()
            .await
            .map_err(call_failure)?;

        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(into_queue_message)
            .collect())
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), CallFailure> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(call_failure)?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_secs: i32,
    ) -> Result<(), CallFailure> {
        self.client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(timeout_secs)
            .send()
            .await
            .map_err(call_failure)?;
        Ok(())
    }
}
