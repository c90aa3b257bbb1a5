use archiver_core::{DefaultPageSet, PageId};
use archiver_logging::archive_debug;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// How a candidate is judged to duplicate an already accepted link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupPolicy {
    /// Reject a candidate whose path occurs anywhere inside an accepted
    /// link's record (page name plus source URL). This also drops a page
    /// whose path is a prefix of an earlier page's path, e.g. `Foo` after
    /// `FooBar` or `Foo/Sub`.
    #[default]
    SerializedRecord,
    /// Reject only a byte-identical path.
    ExactPath,
}

/// A link found on the index page, not yet accepted into the page list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub page: PageId,
    /// Site-relative path as it appeared in the href, query stripped.
    pub path: String,
    /// Where the page source can be downloaded.
    pub url: String,
}

impl CandidateLink {
    /// Textual form of the link that [`DedupPolicy::SerializedRecord`] searches.
    pub fn record(&self) -> String {
        format!("wikiword={} url={}", self.page, self.url)
    }
}

/// Every `href` of every `<a>` in `html`, in document order.
pub fn anchor_targets(html: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Finds the wiki pages linked from an index document.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    root_url: String,
    prefix: String,
    policy: DedupPolicy,
}

impl LinkExtractor {
    /// `root_url` is scheme and host (`http://trac.example.org`), `prefix`
    /// the path every wiki page lives under (`/project/wiki/`).
    pub fn new(root_url: impl Into<String>, prefix: impl Into<String>, policy: DedupPolicy) -> Self {
        let root_url = root_url.into().trim_end_matches('/').to_string();
        Self {
            root_url,
            prefix: prefix.into(),
            policy,
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    pub fn extract(&self, html: &str, defaults: &DefaultPageSet) -> Vec<CandidateLink> {
        let targets = anchor_targets(html);
        archive_debug!("Found {} anchors in index document", targets.len());

        let mut accepted: Vec<CandidateLink> = Vec::new();
        let mut records: Vec<String> = Vec::new();
        for href in &targets {
            let Some(path) = self.site_relative_path(href) else {
                continue;
            };
            let Some(remainder) = path.strip_prefix(self.prefix.as_str()) else {
                continue;
            };
            if remainder.is_empty() {
                continue;
            }
            if defaults.any_within(path) {
                archive_debug!("Skipping default page link {path}");
                continue;
            }
            if self.is_duplicate(path, &accepted, &records) {
                archive_debug!("Skipping duplicate link {path}");
                continue;
            }

            let page = urlencoding::decode(remainder)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| remainder.to_string());
            let candidate = CandidateLink {
                page: PageId::new(page),
                path: path.to_string(),
                url: format!("{}{}?format=txt", self.root_url, path),
            };
            records.push(candidate.record());
            accepted.push(candidate);
        }
        accepted
    }

    fn is_duplicate(&self, path: &str, accepted: &[CandidateLink], records: &[String]) -> bool {
        match self.policy {
            DedupPolicy::SerializedRecord => records.iter().any(|record| record.contains(path)),
            DedupPolicy::ExactPath => accepted.iter().any(|link| link.path == path),
        }
    }

    /// The href's path without query or fragment, if it points at this site.
    fn site_relative_path<'h>(&self, href: &'h str) -> Option<&'h str> {
        let relative = if href.starts_with('/') {
            href
        } else {
            let rest = href.strip_prefix(self.root_url.as_str())?;
            if !rest.starts_with('/') {
                return None;
            }
            rest
        };
        let end = relative.find(['?', '#']).unwrap_or(relative.len());
        Some(&relative[..end])
    }
}
