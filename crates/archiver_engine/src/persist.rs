use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use archiver_core::ArtifactKind;

use crate::ContentKind;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
///
/// A reader never observes a half-written artifact, and an interrupted run
/// leaves the previous version in place.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Where each content kind lands on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub source_dir: PathBuf,
    pub html_dir: PathBuf,
    pub attachment_dir: PathBuf,
}

impl OutputLayout {
    /// Attachments share the HTML directory so cleaned pages can link them by bare name.
    pub fn under(root: &Path) -> Self {
        Self {
            source_dir: root.join("source"),
            html_dir: root.join("html"),
            attachment_dir: root.join("html"),
        }
    }

    pub fn dir_for(&self, kind: ContentKind) -> &Path {
        match kind {
            ContentKind::Source => &self.source_dir,
            ContentKind::Html => &self.html_dir,
            ContentKind::Attachment => &self.attachment_dir,
        }
    }

    pub fn page_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Source => &self.source_dir,
            ArtifactKind::RawHtml | ArtifactKind::CleanedHtml => &self.html_dir,
        }
    }

    /// Prefix that turns an attachment filename into an href valid from inside `html_dir`.
    pub fn attachment_href_prefix(&self) -> String {
        if self.attachment_dir == self.html_dir {
            return String::new();
        }
        match (
            self.html_dir.parent(),
            self.attachment_dir.parent(),
            self.attachment_dir.file_name(),
        ) {
            (Some(html_parent), Some(att_parent), Some(name)) if html_parent == att_parent => {
                format!("../{}/", name.to_string_lossy())
            }
            _ => format!("{}/", self.attachment_dir.display()),
        }
    }
}
