// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One receive, process, acknowledge cycle over the input queue.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::context::{OpenStreamError, ProcessorContext};
use crate::config::EnvConfig;
use crate::data_stream::{
    DataStream, DataStreamError, ObjectLocation, SourceIntegration, EVENT_DELIMITER,
};
use crate::retry::ServiceError;
use crate::s3_event::{self, S3EventError};

/// Most messages SQS returns from one receive.
pub const MAX_MESSAGES_PER_RECEIVE: i32 = 10;

/// Seconds before a message that failed processing is visible again.
pub const FAILED_MESSAGE_VISIBILITY_SECS: i32 = 30;

const FORWARDED_CONTENT_TYPE: &str = "application/x-ndjson";

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Open(#[from] OpenStreamError),

    #[error(transparent)]
    Stream(#[from] DataStreamError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Event(#[from] S3EventError),

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{location} exceeds the {limit} byte forwarding limit")]
    TooLarge {
        location: ObjectLocation,
        limit: usize,
    },
}

/// Outcome of processing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedObject {
    pub bucket: String,
    pub key: String,
    pub events: u64,
}

/// Stage that consumes a [`DataStream`].
#[async_trait]
pub trait StreamProcessor: Send + Sync {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        stream: &mut DataStream,
    ) -> Result<ProcessedObject, ProcessError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedNotification<'a> {
    bucket: &'a str,
    key: &'a str,
    source_id: &'a str,
    events: u64,
}

/// Copies events verbatim to the processed bucket and announces them on the topic.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardingProcessor;

impl ForwardingProcessor {
    pub fn output_key(source: &SourceIntegration, key: &str) -> String {
        format!("raw/{}/{}", source.integration_id, key)
    }

    /// Largest object buffered for upload: half of the function's memory.
    pub fn buffer_limit(config: &EnvConfig) -> usize {
        let bytes = u64::try_from(config.memory_size_mb)
            .unwrap_or(0)
            .saturating_mul(BYTES_PER_MB)
            / 2;
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

#[async_trait]
impl StreamProcessor for ForwardingProcessor {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        stream: &mut DataStream,
    ) -> Result<ProcessedObject, ProcessError> {
        let limit = Self::buffer_limit(ctx.config());
        let mut out = BytesMut::new();
        let mut events = 0u64;
        while let Some(event) = stream.next_event().await? {
            if out.len() + event.len() + 1 > limit {
                stream.close();
                return Err(ProcessError::TooLarge {
                    location: stream.location().clone(),
                    limit,
                });
            }
            out.put_slice(&event);
            out.put_u8(EVENT_DELIMITER);
            events += 1;
        }
        stream.close();

        let config = ctx.config();
        let key = Self::output_key(stream.source(), stream.key());
        let body: Bytes = out.freeze();
        ctx.object_store()
            .put_object(&config.processed_data_bucket, &key, body, FORWARDED_CONTENT_TYPE)
            .await?;

        let notification = serde_json::to_string(&ProcessedNotification {
            bucket: &config.processed_data_bucket,
            key: &key,
            source_id: &stream.source().integration_id,
            events,
        })?;
        let message_id = ctx
            .notifier()
            .publish(&config.sns_topic_arn, &notification)
            .await?;
        debug!("Published notification {message_id} for {key}");

        Ok(ProcessedObject {
            bucket: config.processed_data_bucket.clone(),
            key,
            events,
        })
    }
}

/// Counts for one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub received: usize,
    pub deleted: usize,
    pub failed: usize,
    pub objects: usize,
    pub events: u64,
}

pub struct Worker<P> {
    ctx: Arc<ProcessorContext>,
    processor: P,
}

impl<P: StreamProcessor> Worker<P> {
    pub fn new(ctx: Arc<ProcessorContext>, processor: P) -> Self {
        Worker { ctx, processor }
    }

    /// Receives one batch and processes it.
    ///
    /// A message is deleted only when every object it references was processed;
    /// otherwise it is left to become visible again. Only the receive itself can
    /// fail this call.
    pub async fn poll_once(&self) -> Result<PollSummary, ServiceError> {
        let queue_url = &self.ctx.config().sqs_queue_url;
        let messages = self
            .ctx
            .queue()
            .receive_messages(queue_url, MAX_MESSAGES_PER_RECEIVE, self.ctx.wait_time())
            .await?;

        let mut summary = PollSummary {
            received: messages.len(),
            ..PollSummary::default()
        };
        if messages.is_empty() {
            return Ok(summary);
        }
        debug!("Received {} messages", messages.len());

        for message in messages {
            match self.handle_message(&message.body).await {
                Ok(processed) => {
                    summary.objects += processed.len();
                    summary.events += processed.iter().map(|p| p.events).sum::<u64>();
                    match self
                        .ctx
                        .queue()
                        .delete_message(queue_url, &message.receipt_handle)
                        .await
                    {
                        Ok(()) => summary.deleted += 1,
                        Err(e) => {
                            error!("Failed to delete message {}: {e}", message.message_id);
                            summary.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Leaving message {} for redelivery: {e}",
                        message.message_id
                    );
                    summary.failed += 1;
                    if let Err(e) = self
                        .ctx
                        .queue()
                        .change_visibility(
                            queue_url,
                            &message.receipt_handle,
                            FAILED_MESSAGE_VISIBILITY_SECS,
                        )
                        .await
                    {
                        error!(
                            "Failed to reschedule message {}: {e}",
                            message.message_id
                        );
                    }
                }
            }
        }

        info!(
            "Processed {} objects ({} events) from {} messages, {} failed",
            summary.objects, summary.events, summary.received, summary.failed
        );
        Ok(summary)
    }

    async fn handle_message(&self, body: &str) -> Result<Vec<ProcessedObject>, ProcessError> {
        let mut processed = Vec::new();
        for location in s3_event::object_locations(body)? {
            let source = Arc::new(SourceIntegration::for_bucket(&location.bucket));
            let mut stream = self
                .ctx
                .open_data_stream(source, &location.bucket, &location.key)
                .await?;
            let result = self.processor.process(&self.ctx, &mut stream).await;
            stream.close();
            processed.push(result?);
        }
        Ok(processed)
    }
}
