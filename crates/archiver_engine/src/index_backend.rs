use archiver_core::{DefaultPageSet, PageId};
use archiver_logging::{archive_debug, archive_info};
use serde::{Deserialize, Serialize};

use crate::{
    anchor_targets, decode_text, DedupPolicy, FailureKind, FetchError, FetchSettings, HttpClient,
    LinkExtractor, WikiBackend,
};

fn default_index_page() -> String {
    "TitleIndex".to_string()
}

/// Where the wiki lives when it is scraped over plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSite {
    /// Scheme and host, `http://trac.example.org`.
    pub root_url: String,
    /// Path prefix of wiki pages, `/project/wiki/`.
    pub wiki_prefix: String,
    /// Path prefix of attachment pages. Derived from `wiki_prefix` when absent.
    #[serde(default)]
    pub attachment_prefix: Option<String>,
    #[serde(default = "default_index_page")]
    pub index_page: String,
}

impl IndexSite {
    pub fn new(root_url: impl Into<String>, wiki_prefix: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            wiki_prefix: wiki_prefix.into(),
            attachment_prefix: None,
            index_page: default_index_page(),
        }
    }

    fn root(&self) -> &str {
        self.root_url.trim_end_matches('/')
    }

    /// `/project/wiki/` becomes `/project/attachment/wiki/`.
    pub fn attachment_prefix(&self) -> String {
        if let Some(prefix) = &self.attachment_prefix {
            return prefix.clone();
        }
        match self.wiki_prefix.strip_suffix("wiki/") {
            Some(base) => format!("{base}attachment/wiki/"),
            None => format!("{}/attachment/", self.wiki_prefix.trim_end_matches('/')),
        }
    }

    pub fn index_url(&self) -> String {
        format!("{}{}{}", self.root(), self.wiki_prefix, self.index_page)
    }

    pub fn page_url(&self, page: &PageId) -> String {
        format!("{}{}{}", self.root(), self.wiki_prefix, encode_path(page.as_str()))
    }

    fn attachment_index_url(&self, page: &PageId) -> String {
        format!(
            "{}{}{}/",
            self.root(),
            self.attachment_prefix(),
            encode_path(page.as_str())
        )
    }

    fn attachment_url(&self, name: &str) -> String {
        format!(
            "{}{}{}?format=raw",
            self.root(),
            self.attachment_prefix(),
            encode_path(name)
        )
    }
}

/// Percent-encodes each segment of a page name, keeping the `/` separators.
pub(crate) fn encode_path(name: &str) -> String {
    name.split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

fn percent_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// Discovers pages by scraping the wiki's title index and downloads content
/// through the wiki's `?format=` URLs.
#[derive(Debug, Clone)]
pub struct HtmlIndexBackend {
    http: HttpClient,
    site: IndexSite,
    extractor: LinkExtractor,
}

impl HtmlIndexBackend {
    pub fn new(site: IndexSite, policy: DedupPolicy, settings: FetchSettings) -> Result<Self, FetchError> {
        let http = HttpClient::new(settings)?;
        let extractor = LinkExtractor::new(site.root_url.clone(), site.wiki_prefix.clone(), policy);
        Ok(Self {
            http,
            site,
            extractor,
        })
    }

    pub fn site(&self) -> &IndexSite {
        &self.site
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let output = self.http.get(url).await?;
        if output.metadata.final_url != url {
            archive_debug!("{url} redirected to {}", output.metadata.final_url);
        }
        let decoded = decode_text(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(decoded.text)
    }
}

#[async_trait::async_trait]
impl WikiBackend for HtmlIndexBackend {
    fn describe(&self) -> String {
        format!("HTML index at {}", self.site.index_url())
    }

    async fn list_pages(&self, defaults: &DefaultPageSet) -> Result<Vec<PageId>, FetchError> {
        let url = self.site.index_url();
        archive_info!("Reading index page {url}");
        let html = self.get_text(&url).await?;
        let links = self.extractor.extract(&html, defaults);
        archive_info!("Extracted {} page links", links.len());
        Ok(links.into_iter().map(|link| link.page).collect())
    }

    async fn page_source(&self, page: &PageId) -> Result<String, FetchError> {
        let url = format!("{}?format=txt", self.site.page_url(page));
        self.get_text(&url).await
    }

    async fn page_html(&self, page: &PageId) -> Result<String, FetchError> {
        self.get_text(&self.site.page_url(page)).await
    }

    async fn list_attachments(&self, page: &PageId) -> Result<Vec<String>, FetchError> {
        let url = self.site.attachment_index_url(page);
        let html = match self.get_text(&url).await {
            Ok(html) => html,
            Err(FetchError {
                kind: FailureKind::HttpStatus { status: 404 },
                ..
            }) => {
                archive_debug!("No attachment index for {page}");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        // Trac leaves characters like `()` unescaped, so compare decoded paths.
        let root = self.site.root();
        let listing_prefix = format!("{}{page}/", percent_decode(&self.site.attachment_prefix()));
        let mut names: Vec<String> = Vec::new();
        for href in anchor_targets(&html) {
            let relative = href.strip_prefix(root).unwrap_or(href.as_str());
            let end = relative.find(['?', '#']).unwrap_or(relative.len());
            let decoded = percent_decode(&relative[..end]);
            let Some(file) = decoded.strip_prefix(listing_prefix.as_str()) else {
                continue;
            };
            if file.is_empty() {
                continue;
            }
            let name = format!("{page}/{file}");
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn attachment(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let output = self.http.get(&self.site.attachment_url(name)).await?;
        Ok(output.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_prefix_is_derived_from_wiki_prefix() {
        let site = IndexSite::new("http://h", "/proj/wiki/");
        assert_eq!(site.attachment_prefix(), "/proj/attachment/wiki/");
    }

    #[test]
    fn page_names_are_encoded_per_segment() {
        assert_eq!(encode_path("Dev/Road map"), "Dev/Road%20map");
        let site = IndexSite::new("http://h/", "/proj/wiki/");
        assert_eq!(
            site.page_url(&PageId::new("Dev/Road map")),
            "http://h/proj/wiki/Dev/Road%20map"
        );
        assert_eq!(site.index_url(), "http://h/proj/wiki/TitleIndex");
    }
}
