use archiver_core::{DefaultPageSet, FileNaming, PageId, PageList, PageListError, RunModes};
use archiver_logging::{archive_info, archive_warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    CleanFailurePolicy, CleanReport, ConnectError, ContentFetcher, FetchError, FetchFailure,
    FetchOutcome, HtmlCleaner, OutputLayout, SavedArtifact, SiteInfo, WikiBackend,
};

/// Everything a run needs besides the backend, fixed before the first request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveContext {
    pub site: SiteInfo,
    pub naming: FileNaming,
    pub layout: OutputLayout,
    pub clean_failure: CleanFailurePolicy,
}

/// Where the candidate page names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Ask the backend for every page.
    Remote,
    /// Use the given names.
    Explicit(Vec<PageId>),
}

/// Failures that end a run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Connection(#[from] ConnectError),
    #[error("page discovery failed: {0}")]
    Discovery(#[source] FetchError),
    #[error(transparent)]
    PageList(#[from] PageListError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pages: Vec<PageId>,
    /// Candidates dropped as default pages.
    pub excluded: usize,
    pub saved: Vec<SavedArtifact>,
    pub failures: Vec<FetchFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean: Option<CleanReport>,
}

impl RunReport {
    pub fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Saved(saved) => self.saved.push(saved),
            FetchOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
            || self
                .clean
                .as_ref()
                .is_some_and(|clean| !clean.failures.is_empty())
    }
}

/// Drives one archive run: discovery, then the fetch and clean passes.
pub struct Orchestrator<'a> {
    backend: &'a dyn WikiBackend,
    context: &'a ArchiveContext,
    defaults: &'a DefaultPageSet,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backend: &'a dyn WikiBackend,
        context: &'a ArchiveContext,
        defaults: &'a DefaultPageSet,
    ) -> Self {
        Self {
            backend,
            context,
            defaults,
        }
    }

    /// Builds the run's page list. Fails before anything is fetched.
    pub async fn discover(&self, discovery: Discovery) -> Result<PageList, ArchiveError> {
        let candidates = match discovery {
            Discovery::Remote => {
                archive_info!("Discovering pages through {}", self.backend.describe());
                self.backend
                    .list_pages(self.defaults)
                    .await
                    .map_err(ArchiveError::Discovery)?
            }
            Discovery::Explicit(pages) => pages,
        };

        let found = candidates.len();
        let pages = PageList::build(candidates, self.defaults, &self.context.naming)?;
        for page in &pages {
            if self.context.naming.is_ambiguous(page.as_str()) {
                archive_warn!("Page name {page} already contains a filename placeholder");
            }
        }
        archive_info!(
            "{} pages to archive ({found} found, {} default pages excluded)",
            pages.len(),
            pages.excluded()
        );
        Ok(pages)
    }

    pub async fn run(&self, discovery: Discovery, modes: RunModes) -> Result<RunReport, ArchiveError> {
        let pages = self.discover(discovery).await?;
        Ok(self.archive(&pages, modes).await)
    }

    /// Passes run in a fixed order: sources, rendered html, cleaning,
    /// attachments. Per-item failures are recorded, never returned.
    pub async fn archive(&self, pages: &PageList, modes: RunModes) -> RunReport {
        let context = self.context;
        let fetcher =
            ContentFetcher::new(self.backend, &context.naming, &context.layout).reserving(pages);
        let mut report = RunReport {
            pages: pages.as_slice().to_vec(),
            excluded: pages.excluded(),
            ..RunReport::default()
        };

        if modes.source {
            archive_info!("Downloading wiki sources into {}", context.layout.source_dir.display());
            for page in pages {
                report.record(fetcher.fetch_source(page).await);
            }
        }

        if modes.html {
            archive_info!("Downloading rendered pages into {}", context.layout.html_dir.display());
            for page in pages {
                report.record(fetcher.fetch_rendered_html(page).await);
            }
        }

        if modes.runs_cleaner() {
            archive_info!("Cleaning rendered pages");
            let cleaner = HtmlCleaner::new(
                &context.site,
                &context.naming,
                &context.layout,
                context.clean_failure,
            )
            .archiving(pages.as_slice());
            report.clean = Some(cleaner.clean_all(pages.as_slice()));
        }

        if modes.attachments {
            archive_info!("Downloading attachments into {}", context.layout.attachment_dir.display());
            for page in pages {
                for outcome in fetcher.fetch_attachments(page).await {
                    report.record(outcome);
                }
            }
        }

        archive_info!(
            "Saved {} files, {} failures",
            report.saved.len(),
            report.failures.len()
        );
        report
    }
}
