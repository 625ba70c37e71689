// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory service implementations for testing
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use log_processor_common::clients::{
    FunctionInvoker, Notifier, ObjectStore, QueueClient, QueueMessage, StoredObject,
};
use log_processor_common::context::ServiceClients;
use log_processor_common::{CallFailure, EnvConfig, FailureKind, WaitTime};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Failures returned, in order, before calls start succeeding
#[derive(Default)]
pub struct Script {
    failures: Mutex<VecDeque<FailureKind>>,
    calls: AtomicU32,
}

impl Script {
    pub fn fail_with(&self, kinds: impl IntoIterator<Item = FailureKind>) {
        self.failures.lock().unwrap().extend(kinds);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next(&self, what: &str) -> Result<(), CallFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().pop_front() {
            Some(kind) => Err(CallFailure::new(kind, format!("{what} failed"))),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<(String, String), (Vec<u8>, Option<String>)>>,
    pub gets: Script,
    pub puts: Script,
}

impl MemoryObjectStore {
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8], content_type: Option<&str>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            (data.to_vec(), content_type.map(str::to_string)),
        );
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(data, _)| data.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, CallFailure> {
        self.gets.next("get_object")?;
        let found = self
            .objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned();
        match found {
            Some((data, content_type)) => Ok(StoredObject {
                body: Box::pin(std::io::Cursor::new(data)),
                content_type,
            }),
            None => Err(CallFailure::rejected(format!("NoSuchKey: {bucket}/{key}"))),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), CallFailure> {
        self.puts.next("put_object")?;
        self.insert(bucket, key, &body, Some(content_type));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    pub pending: Mutex<Vec<QueueMessage>>,
    pub deleted: Mutex<Vec<String>>,
    pub waits: Mutex<Vec<WaitTime>>,
    pub rescheduled: Mutex<Vec<(String, i32)>>,
    pub receives: Script,
    pub deletes: Script,
    pub visibility: Script,
}

impl MemoryQueue {
    pub fn push(&self, id: &str, body: &str) {
        self.pending.lock().unwrap().push(QueueMessage {
            message_id: id.to_string(),
            receipt_handle: format!("rh-{id}"),
            body: body.to_string(),
        });
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn receive_messages(
        &self,
        _queue_url: &str,
        max_messages: i32,
        wait: WaitTime,
    ) -> Result<Vec<QueueMessage>, CallFailure> {
        self.receives.next("receive_message")?;
        self.waits.lock().unwrap().push(wait);
        let mut pending = self.pending.lock().unwrap();
        let n = pending.len().min(max_messages as usize);
        Ok(pending.drain(..n).collect())
    }

    async fn delete_message(
        &self,
        _queue_url: &str,
        receipt_handle: &str,
    ) -> Result<(), CallFailure> {
        self.deletes.next("delete_message")?;
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn change_visibility(
        &self,
        _queue_url: &str,
        receipt_handle: &str,
        timeout_secs: i32,
    ) -> Result<(), CallFailure> {
        self.visibility.next("change_message_visibility")?;
        self.rescheduled
            .lock()
            .unwrap()
            .push((receipt_handle.to_string(), timeout_secs));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<(String, String)>>,
    pub script: Script,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<String, CallFailure> {
        self.script.next("publish")?;
        let mut published = self.published.lock().unwrap();
        published.push((topic_arn.to_string(), message.to_string()));
        Ok(format!("msg-{}", published.len()))
    }
}

#[derive(Default)]
pub struct EchoInvoker {
    pub script: Script,
}

#[async_trait]
impl FunctionInvoker for EchoInvoker {
    async fn invoke(&self, _function_name: &str, payload: Bytes) -> Result<Bytes, CallFailure> {
        self.script.next("invoke")?;
        Ok(payload)
    }
}

pub struct Services {
    pub store: Arc<MemoryObjectStore>,
    pub queue: Arc<MemoryQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub invoker: Arc<EchoInvoker>,
}

impl Services {
    pub fn new() -> Self {
        Services {
            store: Arc::new(MemoryObjectStore::default()),
            queue: Arc::new(MemoryQueue::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            invoker: Arc::new(EchoInvoker::default()),
        }
    }

    pub fn clients(&self) -> ServiceClients {
        ServiceClients {
            object_store: self.store.clone(),
            queue: self.queue.clone(),
            notifier: self.notifier.clone(),
            functions: self.invoker.clone(),
        }
    }
}

pub fn test_config(sqs_delay_secs: i64) -> EnvConfig {
    EnvConfig {
        memory_size_mb: 1024,
        processed_data_bucket: "processed-logs".to_string(),
        sqs_queue_url: "https://sqs.us-east-1.amazonaws.com/123456789012/input".to_string(),
        sqs_delay_secs,
        sns_topic_arn: "arn:aws:sns:us-east-1:123456789012:processed".to_string(),
        log_level: "info".to_string(),
    }
}
