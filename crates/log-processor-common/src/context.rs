// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide clients and settings, built once before any work is accepted.

use std::sync::Arc;

use tracing::{debug, info};

use crate::aws::{self, LambdaInvoker, S3ObjectStore, SnsNotifier, SqsQueue};
use crate::clients::{FunctionInvoker, Notifier, ObjectStore, QueueClient, Retrying};
use crate::config::EnvConfig;
use crate::data_stream::{DataStream, DataStreamError, ObjectLocation, SourceIntegration};
use crate::error::SetupError;
use crate::poll::WaitTime;
use crate::retry::{RetryPolicy, ServiceError};

/// Content type assumed when storage does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum OpenStreamError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Stream(#[from] DataStreamError),
}

/// Raw clients to wrap. Each is placed behind the shared retry policy.
pub struct ServiceClients {
    pub object_store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn QueueClient>,
    pub notifier: Arc<dyn Notifier>,
    pub functions: Arc<dyn FunctionInvoker>,
}

/// Everything a worker needs to issue outbound calls.
///
/// Read-only after construction; share it as `Arc<ProcessorContext>`.
#[derive(Debug)]
pub struct ProcessorContext {
    config: EnvConfig,
    wait_time: WaitTime,
    object_store: Retrying<dyn ObjectStore>,
    queue: Retrying<dyn QueueClient>,
    notifier: Retrying<dyn Notifier>,
    functions: Retrying<dyn FunctionInvoker>,
}

impl ProcessorContext {
    pub fn new(config: EnvConfig, clients: ServiceClients, policy: RetryPolicy) -> Self {
        let wait_time = WaitTime::from_delay_secs(config.sqs_delay_secs);
        if i64::from(wait_time.as_secs()) != config.sqs_delay_secs {
            info!(
                "SQS_DELAY_SEC={} is outside the long-poll range, using {wait_time}",
                config.sqs_delay_secs
            );
        }

        ProcessorContext {
            config,
            wait_time,
            object_store: Retrying::new(clients.object_store, policy),
            queue: Retrying::new(clients.queue, policy),
            notifier: Retrying::new(clients.notifier, policy),
            functions: Retrying::new(clients.functions, policy),
        }
    }

    /// Loads configuration from the environment and builds the AWS clients.
    ///
    /// Configuration is validated before any client is created, so a failure
    /// here leaves nothing half-initialized.
    pub async fn from_env() -> Result<Self, SetupError> {
        let config = EnvConfig::from_env()?;
        debug!("Loaded configuration: {config:?}");

        let sdk_config = aws::load_sdk_config().await;
        let clients = ServiceClients {
            object_store: Arc::new(S3ObjectStore::new(&sdk_config)),
            queue: Arc::new(SqsQueue::new(&sdk_config)),
            notifier: Arc::new(SnsNotifier::new(&sdk_config)),
            functions: Arc::new(LambdaInvoker::new(&sdk_config)),
        };
        Ok(ProcessorContext::new(config, clients, RetryPolicy::default()))
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Long-poll wait used for every queue receive.
    pub fn wait_time(&self) -> WaitTime {
        self.wait_time
    }

    pub fn object_store(&self) -> &Retrying<dyn ObjectStore> {
        &self.object_store
    }

    pub fn queue(&self) -> &Retrying<dyn QueueClient> {
        &self.queue
    }

    pub fn notifier(&self) -> &Retrying<dyn Notifier> {
        &self.notifier
    }

    pub fn functions(&self) -> &Retrying<dyn FunctionInvoker> {
        &self.functions
    }

    /// Opens `bucket/key` through the retrying object store.
    ///
    /// The returned stream is fully populated; nothing is handed out on failure.
    pub async fn open_data_stream(
        &self,
        source: Arc<SourceIntegration>,
        bucket: &str,
        key: &str,
    ) -> Result<DataStream, OpenStreamError> {
        let object = self.object_store.get_object(bucket, key).await?;
        let content_type = object
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let stream = DataStream::new(
            object.body,
            source,
            ObjectLocation::new(bucket, key),
            content_type,
        )?;
        Ok(stream)
    }
}
