//! Load request and response types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Unique identifier for load requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// TCP endpoint serving a document of known length
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub host: String,
    pub port: u16,
    /// Exact number of bytes the peer will send
    pub expected_len: usize,
}

impl StreamEndpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, expected_len: usize) -> Self {
        Self {
            host: host.into(),
            port,
            expected_len,
        }
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bytes handed over by the caller rather than read from storage
#[derive(Clone, PartialEq, Eq)]
pub enum BytePayload {
    /// Already in memory
    Resident(Vec<u8>),
    /// Delivered over a connection-oriented byte stream
    Streamed(StreamEndpoint),
}

impl std::fmt::Debug for BytePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BytePayload::Resident(bytes) => f
                .debug_tuple("Resident")
                .field(&format_args!("{} bytes", bytes.len()))
                .finish(),
            BytePayload::Streamed(endpoint) => f.debug_tuple("Streamed").field(endpoint).finish(),
        }
    }
}

/// Where the document bytes live
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ByteSource {
    /// Local filesystem path
    File(PathBuf),
    /// Logical name inside the bundled asset store
    Asset(String),
    /// Caller-supplied bytes
    Bytes(BytePayload),
}

impl ByteSource {
    /// Short tag used in logs
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            ByteSource::File(_) => "file",
            ByteSource::Asset(_) => "asset",
            ByteSource::Bytes(BytePayload::Resident(_)) => "bytes",
            ByteSource::Bytes(BytePayload::Streamed(_)) => "stream",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ByteSource::File(path) if path.as_os_str().is_empty() => {
                Err(LoadError::invalid("file path is empty"))
            }
            ByteSource::Asset(name) if name.trim().is_empty() => {
                Err(LoadError::invalid("asset identifier is empty"))
            }
            ByteSource::Bytes(BytePayload::Resident(bytes)) if bytes.is_empty() => {
                Err(LoadError::invalid("resident byte payload is absent"))
            }
            ByteSource::Bytes(BytePayload::Streamed(endpoint)) => {
                if endpoint.host.is_empty() {
                    return Err(LoadError::invalid("stream host is empty"));
                }
                if endpoint.expected_len == 0 {
                    return Err(LoadError::invalid(
                        "streamed payload must declare a positive length",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Display flags forwarded untouched to the renderer.
///
/// Every flag defaults to `false` when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayOptions {
    #[serde(default)]
    pub night_mode: bool,
    #[serde(default)]
    pub enable_swipe: bool,
    #[serde(default)]
    pub swipe_horizontal: bool,
    #[serde(default)]
    pub auto_spacing: bool,
    #[serde(default)]
    pub page_fling: bool,
    #[serde(default)]
    pub page_snap: bool,
    #[serde(default)]
    pub enable_immersive: bool,
    #[serde(default)]
    pub auto_play: bool,
    #[serde(default)]
    pub force_landscape: bool,
    /// Restrict display to these page indices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u32>>,
}

impl DisplayOptions {
    /// Real page number behind the `displayed` page index.
    ///
    /// With a `pages` subset the viewer shows `pages[i]` at index `i`;
    /// indices past the subset map to nothing.
    #[must_use]
    pub fn actual_page(&self, displayed: u32) -> Option<u32> {
        match &self.pages {
            Some(pages) => usize::try_from(displayed)
                .ok()
                .and_then(|i| pages.get(i).copied()),
            None => Some(displayed),
        }
    }
}

/// One document-open action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub source: ByteSource,
    pub decryption_key: Option<String>,
    pub password: Option<String>,
    pub display: DisplayOptions,
    /// Caller-chosen id used for reading analytics
    pub document_id: Option<String>,
}

impl LoadRequest {
    #[must_use]
    pub fn new(source: ByteSource) -> Self {
        Self {
            source,
            decryption_key: None,
            password: None,
            display: DisplayOptions::default(),
            document_id: None,
        }
    }

    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(ByteSource::File(path.into()))
    }

    #[must_use]
    pub fn from_asset(name: impl Into<String>) -> Self {
        Self::new(ByteSource::Asset(name.into()))
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(ByteSource::Bytes(BytePayload::Resident(bytes)))
    }

    #[must_use]
    pub fn from_stream(endpoint: StreamEndpoint) -> Self {
        Self::new(ByteSource::Bytes(BytePayload::Streamed(endpoint)))
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.decryption_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: DisplayOptions) -> Self {
        self.display = display;
        self
    }

    #[must_use]
    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    /// Check the request invariants without touching any byte source
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        if matches!(self.decryption_key.as_deref(), Some("")) {
            return Err(LoadError::invalid("decryption key must not be empty"));
        }
        Ok(())
    }
}

/// Fully materialized, decrypted document plus pass-through metadata
#[derive(Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub bytes: Vec<u8>,
    pub password: Option<String>,
    pub display: DisplayOptions,
    pub document_id: Option<String>,
    /// Whether the cipher step ran
    pub decrypted: bool,
}

impl std::fmt::Debug for LoadResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadResult")
            .field("bytes_len", &self.bytes.len())
            .field("has_password", &self.password.is_some())
            .field("display", &self.display)
            .field("document_id", &self.document_id)
            .field("decrypted", &self.decrypted)
            .finish()
    }
}

/// Terminal message posted by a load worker
#[derive(Debug)]
pub enum LoadOutcome {
    Complete(LoadResult),
    Failed(LoadError),
}

impl From<Result<LoadResult>> for LoadOutcome {
    fn from(result: Result<LoadResult>) -> Self {
        match result {
            Ok(loaded) => LoadOutcome::Complete(loaded),
            Err(e) => LoadOutcome::Failed(e),
        }
    }
}

/// Response from load workers
#[derive(Debug)]
pub struct LoadResponse {
    pub id: RequestId,
    pub outcome: LoadOutcome,
}
