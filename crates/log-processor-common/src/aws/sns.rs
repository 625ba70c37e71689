// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client;

use super::call_failure;
use crate::clients::Notifier;
use crate::retry::CallFailure;

#[derive(Debug, Clone)]
pub struct SnsNotifier {
    client: Client,
}

impl SnsNotifier {
    pub fn new(config: &SdkConfig) -> Self {
        SnsNotifier {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<String, CallFailure> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .send()
            .await
            .map_err(call_failure)?;
        Ok(output.message_id.unwrap_or_default())
    }
}
