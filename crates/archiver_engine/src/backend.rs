use archiver_core::{DefaultPageSet, PageId};

use crate::FetchError;

/// Remote operations the archive pipeline needs from a wiki.
///
/// Implemented by [`crate::XmlRpcBackend`] (remote procedure interface) and
/// [`crate::HtmlIndexBackend`] (index page scraping).
#[async_trait::async_trait]
pub trait WikiBackend: Send + Sync {
    /// Short human-readable name of the transport, used in logs.
    fn describe(&self) -> String;

    /// Every page the wiki reports, unfiltered. `defaults` is only consulted
    /// by transports whose discovery heuristics need it.
    async fn list_pages(&self, defaults: &DefaultPageSet) -> Result<Vec<PageId>, FetchError>;

    async fn page_source(&self, page: &PageId) -> Result<String, FetchError>;

    async fn page_html(&self, page: &PageId) -> Result<String, FetchError>;

    /// Attachment names of `page`, each of the form `Page/file.ext`.
    async fn list_attachments(&self, page: &PageId) -> Result<Vec<String>, FetchError>;

    async fn attachment(&self, name: &str) -> Result<Vec<u8>, FetchError>;
}
