use std::collections::HashSet;

use archiver_core::{ArtifactKind, FileNaming, PageId, PageList};
use archiver_logging::{archive_debug, archive_info, archive_warn};

use crate::{
    AtomicFileWriter, ContentArtifact, ContentKind, FailureKind, FetchError, FetchFailure,
    FetchOutcome, OutputLayout, SavedArtifact, WikiBackend,
};

/// Retrieves one content kind of one page and writes it to disk at once.
///
/// Never returns an error: every failure, including a failed write, becomes
/// a [`FetchOutcome::Failed`] so the caller can carry on with the next item.
pub struct ContentFetcher<'a> {
    backend: &'a dyn WikiBackend,
    naming: &'a FileNaming,
    layout: &'a OutputLayout,
    reserved: HashSet<String>,
}

impl<'a> ContentFetcher<'a> {
    pub fn new(backend: &'a dyn WikiBackend, naming: &'a FileNaming, layout: &'a OutputLayout) -> Self {
        Self {
            backend,
            naming,
            layout,
            reserved: HashSet::new(),
        }
    }

    /// Refuses attachments whose file would replace a page artifact of `pages`
    /// in the attachment directory.
    pub fn reserving(mut self, pages: &PageList) -> Self {
        let (naming, layout) = (self.naming, self.layout);
        let attachment_dir = layout.dir_for(ContentKind::Attachment);
        for kind in ArtifactKind::ALL {
            if layout.page_dir(kind) == attachment_dir {
                self.reserved
                    .extend(pages.iter().map(|page| naming.page_filename(page, kind)));
            }
        }
        self
    }

    pub async fn fetch_source(&self, page: &PageId) -> FetchOutcome {
        archive_debug!("Fetching source of {page}");
        match self.backend.page_source(page).await {
            Ok(text) => self.persist(ContentArtifact::page_text(page.clone(), ContentKind::Source, text)),
            Err(error) => self.failed(page, ContentKind::Source, None, error),
        }
    }

    pub async fn fetch_rendered_html(&self, page: &PageId) -> FetchOutcome {
        archive_debug!("Fetching rendered html of {page}");
        match self.backend.page_html(page).await {
            Ok(html) => self.persist(ContentArtifact::page_text(page.clone(), ContentKind::Html, html)),
            Err(error) => self.failed(page, ContentKind::Html, None, error),
        }
    }

    /// An empty result means the page has no attachments. A failed listing
    /// yields exactly one failed outcome.
    pub async fn fetch_attachments(&self, page: &PageId) -> Vec<FetchOutcome> {
        let names = match self.backend.list_attachments(page).await {
            Ok(names) => names,
            Err(error) => return vec![self.failed(page, ContentKind::Attachment, None, error)],
        };
        if names.is_empty() {
            archive_debug!("{page} has no attachments");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let filename = self.naming.attachment_filename(&name);
            if self.reserved.contains(&filename) {
                let error = FetchError::new(
                    FailureKind::NameCollision,
                    format!("{filename} is already the file of an archived page"),
                );
                outcomes.push(self.failed(page, ContentKind::Attachment, Some(name), error));
                continue;
            }
            archive_debug!("Fetching attachment {name}");
            let outcome = match self.backend.attachment(&name).await {
                Ok(bytes) => self.persist(ContentArtifact::attachment(page.clone(), name, bytes)),
                Err(error) => self.failed(page, ContentKind::Attachment, Some(name), error),
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    fn persist(&self, artifact: ContentArtifact) -> FetchOutcome {
        let filename = artifact.filename(self.naming);
        let writer = AtomicFileWriter::new(self.layout.dir_for(artifact.kind).to_path_buf());
        match writer.write(&filename, &artifact.payload) {
            Ok(path) => {
                archive_info!("Saved {} of {} to {}", artifact.kind, artifact.page, path.display());
                FetchOutcome::Saved(SavedArtifact {
                    bytes: artifact.payload.len() as u64,
                    page: artifact.page,
                    kind: artifact.kind,
                    attachment: artifact.attachment,
                    path,
                })
            }
            Err(err) => {
                let error = FetchError::new(FailureKind::Filesystem, err.to_string());
                self.failed(&artifact.page, artifact.kind, artifact.attachment, error)
            }
        }
    }

    fn failed(
        &self,
        page: &PageId,
        kind: ContentKind,
        attachment: Option<String>,
        error: FetchError,
    ) -> FetchOutcome {
        match &attachment {
            Some(name) => archive_warn!("Failed to fetch {kind} {name} of {page}: {error}"),
            None => archive_warn!("Failed to fetch {kind} of {page}: {error}"),
        }
        FetchOutcome::Failed(FetchFailure {
            page: page.clone(),
            kind,
            attachment,
            error,
        })
    }
}
