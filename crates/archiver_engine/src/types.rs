use std::fmt;
use std::path::PathBuf;

use archiver_core::{ArtifactKind, FileNaming, PageId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Source,
    Html,
    Attachment,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Source => write!(f, "source"),
            ContentKind::Html => write!(f, "html"),
            ContentKind::Attachment => write!(f, "attachment"),
        }
    }
}

/// One retrieved payload, alive only until it has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentArtifact {
    pub page: PageId,
    pub kind: ContentKind,
    /// Attachment sub-name, e.g. `Page/diagram.png`.
    pub attachment: Option<String>,
    pub payload: Vec<u8>,
}

impl ContentArtifact {
    pub fn page_text(page: PageId, kind: ContentKind, text: String) -> Self {
        Self {
            page,
            kind,
            attachment: None,
            payload: text.into_bytes(),
        }
    }

    pub fn attachment(page: PageId, name: String, payload: Vec<u8>) -> Self {
        Self {
            page,
            kind: ContentKind::Attachment,
            attachment: Some(name),
            payload,
        }
    }

    pub fn filename(&self, naming: &FileNaming) -> String {
        match (self.kind, self.attachment.as_deref()) {
            (ContentKind::Attachment, Some(name)) => naming.attachment_filename(name),
            (ContentKind::Attachment, None) => naming.attachment_filename(self.page.as_str()),
            (ContentKind::Source, _) => naming.page_filename(&self.page, ArtifactKind::Source),
            (ContentKind::Html, _) => naming.page_filename(&self.page, ArtifactKind::RawHtml),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedArtifact {
    pub page: PageId,
    pub kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub page: PageId,
    pub kind: ContentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub error: FetchError,
}

/// Result of one fetch attempt: saved to disk, or recorded as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Saved(SavedArtifact),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, FetchOutcome::Saved(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus { status: u16 },
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    Decode,
    Protocol,
    RpcFault { code: i64 },
    Filesystem,
    /// The target filename belongs to another archived artifact.
    NameCollision,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus { status } => write!(f, "http status {status}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::Protocol => write!(f, "protocol error"),
            FailureKind::RpcFault { code } => write!(f, "rpc fault {code}"),
            FailureKind::Filesystem => write!(f, "filesystem error"),
            FailureKind::NameCollision => write!(f, "filename collision"),
        }
    }
}
