// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::Client;
use bytes::Bytes;

use super::call_failure;
use crate::clients::FunctionInvoker;
use crate::retry::CallFailure;

#[derive(Debug, Clone)]
pub struct LambdaInvoker {
    client: Client,
}

impl LambdaInvoker {
    pub fn new(config: &SdkConfig) -> Self {
        LambdaInvoker {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<Bytes, CallFailure> {
        let output = self
            .client
            .invoke()
            .function_name(function_name)
            .payload(Blob::new(payload.to_vec()))
            .send()
            .await
            .map_err(call_failure)?;

        // the call itself succeeded but the function raised
        if let Some(function_error) = output.function_error {
            return Err(CallFailure::rejected(format!(
                "{function_name} returned {function_error}"
            )));
        }
        Ok(output
            .payload
            .map(|blob| Bytes::from(blob.into_inner()))
            .unwrap_or_default())
    }
}
