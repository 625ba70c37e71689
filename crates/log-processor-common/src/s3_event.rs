// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Extraction of object references from queue messages.
//!
//! Messages carry S3 event notifications, either delivered to the queue
//! directly or wrapped in an SNS envelope when the bucket notifies a topic
//! that fans out to the queue.

use serde::Deserialize;

use crate::data_stream::ObjectLocation;

const SNS_NOTIFICATION_TYPE: &str = "Notification";
const S3_TEST_EVENT: &str = "s3:TestEvent";

#[derive(Debug, thiserror::Error)]
pub enum S3EventError {
    #[error("message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("object key '{0}' is not valid percent-encoded UTF-8")]
    Key(String),
}

#[derive(Debug, Deserialize)]
struct SnsEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct S3Notification {
    #[serde(rename = "Records", default)]
    records: Vec<S3Record>,
    #[serde(rename = "Event")]
    event: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// Returns every object referenced by a queue message body.
///
/// Test events and messages without records yield an empty list.
pub fn object_locations(body: &str) -> Result<Vec<ObjectLocation>, S3EventError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let notification: S3Notification = match serde_json::from_value::<SnsEnvelope>(value.clone())
    {
        Ok(envelope) if envelope.kind == SNS_NOTIFICATION_TYPE => {
            serde_json::from_str(&envelope.message)?
        }
        _ => serde_json::from_value(value)?,
    };

    if notification.event.as_deref() == Some(S3_TEST_EVENT) {
        return Ok(Vec::new());
    }

    notification
        .records
        .into_iter()
        .map(|record| -> Result<ObjectLocation, S3EventError> {
            let key = decode_key(&record.s3.object.key)?;
            Ok(ObjectLocation::new(record.s3.bucket.name, key))
        })
        .collect()
}

/// S3 notifications form-encode keys: spaces arrive as `+`.
fn decode_key(raw: &str) -> Result<String, S3EventError> {
    let plus_decoded = raw.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|key| key.into_owned())
        .map_err(|_| S3EventError::Key(raw.to_string()))
}
