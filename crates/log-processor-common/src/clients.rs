// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Service interfaces used by the processor and the retrying decorator around them.
//!
//! Implementations report one attempt at a time as a [`CallFailure`]. Callers
//! never talk to an implementation directly: they go through [`Retrying`],
//! which owns the backoff policy and returns a single [`ServiceError`] on
//! failure.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::data_stream::ByteReader;
use crate::poll::WaitTime;
use crate::retry::{retry, CallFailure, RetryPolicy, ServiceError};

/// An object opened for reading.
pub struct StoredObject {
    pub body: ByteReader,
    pub content_type: Option<String>,
}

impl fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, CallFailure>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), CallFailure>;
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-polls the queue for up to `wait`.
    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait: WaitTime,
    ) -> Result<Vec<QueueMessage>, CallFailure>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str)
        -> Result<(), CallFailure>;

    async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_secs: i32,
    ) -> Result<(), CallFailure>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the id the topic assigned to the message.
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<String, CallFailure>;
}

#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<Bytes, CallFailure>;
}

/// Applies a [`RetryPolicy`] to every call made through the wrapped client.
///
/// Holds no per-call state, so a single instance is shared by all workers.
pub struct Retrying<C: ?Sized> {
    inner: Arc<C>,
    policy: RetryPolicy,
}

impl<C: ?Sized> Retrying<C> {
    pub fn new(inner: Arc<C>, policy: RetryPolicy) -> Self {
        Retrying { inner, policy }
    }
}

impl<C: ?Sized> Clone for Retrying<C> {
    fn clone(&self) -> Self {
        Retrying {
            inner: Arc::clone(&self.inner),
            policy: self.policy,
        }
    }
}

impl<C: ?Sized> fmt::Debug for Retrying<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<C: ObjectStore + ?Sized> Retrying<C> {
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "s3.get_object", move || {
            inner.get_object(bucket, key)
        })
        .await
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "s3.put_object", move || {
            inner.put_object(bucket, key, body.clone(), content_type)
        })
        .await
    }
}

impl<C: QueueClient + ?Sized> Retrying<C> {
    pub async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait: WaitTime,
    ) -> Result<Vec<QueueMessage>, ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "sqs.receive_message", move || {
            inner.receive_messages(queue_url, max_messages, wait)
        })
        .await
    }

    pub async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "sqs.delete_message", move || {
            inner.delete_message(queue_url, receipt_handle)
        })
        .await
    }

    pub async fn change_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout_secs: i32,
    ) -> Result<(), ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "sqs.change_message_visibility", move || {
            inner.change_visibility(queue_url, receipt_handle, timeout_secs)
        })
        .await
    }
}

impl<C: Notifier + ?Sized> Retrying<C> {
    pub async fn publish(&self, topic_arn: &str, message: &str) -> Result<String, ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "sns.publish", move || {
            inner.publish(topic_arn, message)
        })
        .await
    }
}

impl<C: FunctionInvoker + ?Sized> Retrying<C> {
    pub async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<Bytes, ServiceError> {
        let inner = &self.inner;
        retry(&self.policy, "lambda.invoke", move || {
            inner.invoke(function_name, payload.clone())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FailureKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Publishes fail with the queued failures first, then succeed.
    struct FlakyNotifier {
        failures: Mutex<VecDeque<FailureKind>>,
        calls: AtomicU32,
    }

    impl FlakyNotifier {
        fn new(failures: impl IntoIterator<Item = FailureKind>) -> Arc<Self> {
            Arc::new(FlakyNotifier {
                failures: Mutex::new(failures.into_iter().collect()),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn publish(&self, _topic_arn: &str, message: &str) -> Result<String, CallFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.failures.lock().unwrap().pop_front();
            match next {
                Some(kind) => Err(CallFailure::new(kind, "publish failed")),
                None => Ok(format!("id-{message}")),
            }
        }
    }

    struct EchoInvoker {
        payloads: Mutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl FunctionInvoker for EchoInvoker {
        async fn invoke(&self, _function_name: &str, payload: Bytes) -> Result<Bytes, CallFailure> {
            let mut seen = self.payloads.lock().unwrap();
            seen.push(payload.clone());
            if seen.len() < 3 {
                return Err(CallFailure::connection("connection reset"));
            }
            Ok(payload)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_notifier_recovers() {
        let notifier = FlakyNotifier::new([FailureKind::Connection, FailureKind::Throttled]);
        let client = Retrying::new(Arc::clone(&notifier), RetryPolicy::default());

        let id = client.publish("arn:aws:sns:topic", "hello").await.unwrap();
        assert_eq!(id, "id-hello");
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrying_notifier_surfaces_rejection() {
        let notifier = FlakyNotifier::new([FailureKind::Rejected, FailureKind::Connection]);
        let client = Retrying::new(Arc::clone(&notifier), RetryPolicy::default());

        let err = client.publish("arn:aws:sns:topic", "hello").await.unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.operation(), "sns.publish");
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_client_shared_by_tasks() {
        let notifier = FlakyNotifier::new(std::iter::repeat(FailureKind::Connection).take(4));
        let client = Arc::new(Retrying::new(Arc::clone(&notifier), RetryPolicy::default()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    client
                        .publish("arn:aws:sns:topic", &format!("m{i}"))
                        .await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), format!("id-m{i}"));
        }
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_replayed_on_each_attempt() {
        let invoker = Arc::new(EchoInvoker {
            payloads: Mutex::new(Vec::new()),
        });
        let client: Retrying<dyn FunctionInvoker> =
            Retrying::new(invoker.clone(), RetryPolicy::default());

        let out = client
            .invoke("fanout", Bytes::from_static(b"{\"n\":1}"))
            .await
            .unwrap();
        assert_eq!(out, Bytes::from_static(b"{\"n\":1}"));

        let seen = invoker.payloads.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|p| p == &Bytes::from_static(b"{\"n\":1}")));
    }
}
