// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The unit of work handed from the storage read to the processing stage.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

/// Separator between log events in a stored object.
pub const EVENT_DELIMITER: u8 = b'\n';

/// Forward-only byte source backing a [`DataStream`].
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum DataStreamError {
    #[error("data stream for {0} is closed")]
    Closed(ObjectLocation),

    #[error("invalid data stream: {0}")]
    Invalid(&'static str),

    #[error("failed reading {location}: {source}")]
    Io {
        location: ObjectLocation,
        #[source]
        source: io::Error,
    },
}

/// Identity of the configured source that produced a batch of logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIntegration {
    pub integration_id: String,
    pub label: String,
}

impl SourceIntegration {
    pub fn new(integration_id: impl Into<String>, label: impl Into<String>) -> Self {
        SourceIntegration {
            integration_id: integration_id.into(),
            label: label.into(),
        }
    }

    /// Source keyed by the bucket its objects are read from.
    pub fn for_bucket(bucket: &str) -> Self {
        SourceIntegration::new(bucket, bucket)
    }
}

/// Where an object lives in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        ObjectLocation {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One object's worth of log data moving through the pipeline.
///
/// Owns its reader exclusively. Once [`DataStream::close`] is called (or the
/// stream reaches a read error) further reads fail with
/// [`DataStreamError::Closed`] instead of returning empty data.
pub struct DataStream {
    reader: Option<BufReader<ByteReader>>,
    source: Arc<SourceIntegration>,
    location: ObjectLocation,
    content_type: String,
}

impl DataStream {
    pub fn new(
        reader: ByteReader,
        source: Arc<SourceIntegration>,
        location: ObjectLocation,
        content_type: impl Into<String>,
    ) -> Result<Self, DataStreamError> {
        let content_type = content_type.into();
        if source.integration_id.trim().is_empty() {
            return Err(DataStreamError::Invalid("source integration id is empty"));
        }
        if source.label.trim().is_empty() {
            return Err(DataStreamError::Invalid("source integration label is empty"));
        }
        if location.bucket.trim().is_empty() {
            return Err(DataStreamError::Invalid("bucket is empty"));
        }
        if location.key.is_empty() {
            return Err(DataStreamError::Invalid("object key is empty"));
        }
        if content_type.trim().is_empty() {
            return Err(DataStreamError::Invalid("content type is empty"));
        }

        Ok(DataStream {
            reader: Some(BufReader::new(reader)),
            source,
            location,
            content_type,
        })
    }

    pub fn source(&self) -> &Arc<SourceIntegration> {
        &self.source
    }

    pub fn location(&self) -> &ObjectLocation {
        &self.location
    }

    pub fn bucket(&self) -> &str {
        &self.location.bucket
    }

    pub fn key(&self) -> &str {
        &self.location.key
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Reads the next event, without its trailing delimiter.
    ///
    /// Returns `Ok(None)` at end of stream. A final event without a trailing
    /// delimiter is still returned.
    pub async fn next_event(&mut self) -> Result<Option<Vec<u8>>, DataStreamError> {
        let reader = self.reader_mut()?;
        let mut event = Vec::new();
        let read = reader.read_until(EVENT_DELIMITER, &mut event).await;
        match read {
            Ok(0) => Ok(None),
            Ok(_) => {
                if event.last() == Some(&EVENT_DELIMITER) {
                    event.pop();
                }
                Ok(Some(event))
            }
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Drains whatever is left of the stream.
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, DataStreamError> {
        let reader = self.reader_mut()?;
        let mut buf = Vec::new();
        match reader.read_to_end(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Releases the underlying reader. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.reader = None;
    }

    fn reader_mut(&mut self) -> Result<&mut BufReader<ByteReader>, DataStreamError> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader),
            None => Err(DataStreamError::Closed(self.location.clone())),
        }
    }

    fn fail(&mut self, source: io::Error) -> DataStreamError {
        self.close();
        DataStreamError::Io {
            location: self.location.clone(),
            source,
        }
    }
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStream")
            .field("source", &self.source)
            .field("location", &self.location)
            .field("content_type", &self.content_type)
            .field("closed", &self.is_closed())
            .finish()
    }
}
