// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use super::call_failure;
use crate::clients::{ObjectStore, StoredObject};
use crate::retry::CallFailure;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        S3ObjectStore {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, CallFailure> {
        debug!("Opening s3://{bucket}/{key}");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(call_failure)?;

        let content_type = output.content_type().map(str::to_owned);
        Ok(StoredObject {
            body: Box::pin(output.body.into_async_read()),
            content_type,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), CallFailure> {
        debug!("Uploading {} bytes to s3://{bucket}/{key}", body.len());
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(call_failure)?;
        Ok(())
    }
}
