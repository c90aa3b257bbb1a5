use std::collections::HashSet;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::PathBuf;

use archiver_core::{ArtifactKind, FileNaming, PageId};
use archiver_logging::{archive_error, archive_info, archive_warn};
use askama::Template;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index_backend::encode_path;
use crate::{AtomicFileWriter, OutputLayout, PersistError};

/// What happens to the rest of the cleaning pass after one page fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanFailurePolicy {
    /// Stop cleaning; the remaining pages are reported as skipped.
    #[default]
    AbortBatch,
    /// Record the failure and continue with the next page.
    SkipPage,
}

/// The wiki the raw HTML was fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub server: String,
    pub module: String,
}

impl SiteInfo {
    fn server(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    fn module_base(&self) -> String {
        let module = self.module.trim_matches('/');
        if module.is_empty() {
            String::new()
        } else {
            format!("/{module}")
        }
    }

    pub fn page_url(&self, page: &PageId) -> String {
        format!(
            "{}{}/wiki/{}",
            self.server(),
            self.module_base(),
            encode_path(page.as_str())
        )
    }
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("raw html {} not found", path.display())]
    MissingRaw { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed markup: {0}")]
    Markup(String),
    #[error("template rendering failed: {0}")]
    Render(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanFailure {
    pub page: PageId,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub cleaned: Vec<PathBuf>,
    pub failures: Vec<CleanFailure>,
    /// Pages never attempted because the pass was aborted.
    pub skipped: Vec<PageId>,
    pub aborted: bool,
}

#[derive(Template)]
#[template(path = "cleaned_page.html")]
struct CleanedPage<'a> {
    title: &'a str,
    server: &'a str,
    module: &'a str,
    page_name: &'a str,
    slash: &'a str,
    space: &'a str,
    source_url: &'a str,
    body: &'a str,
}

/// Turns `<page>.original.html` into a standalone `<page>.html` whose wiki
/// and attachment links point at the other archived files.
pub struct HtmlCleaner<'a> {
    site: &'a SiteInfo,
    naming: &'a FileNaming,
    layout: &'a OutputLayout,
    policy: CleanFailurePolicy,
    archived: Option<HashSet<PageId>>,
}

impl<'a> HtmlCleaner<'a> {
    pub fn new(
        site: &'a SiteInfo,
        naming: &'a FileNaming,
        layout: &'a OutputLayout,
        policy: CleanFailurePolicy,
    ) -> Self {
        Self {
            site,
            naming,
            layout,
            policy,
            archived: None,
        }
    }

    /// Only links to `pages` (and their attachments) become local; links to
    /// any other page keep pointing at the server.
    pub fn archiving(mut self, pages: &[PageId]) -> Self {
        self.archived = Some(pages.iter().cloned().collect());
        self
    }

    /// Cleans `pages` in order, honouring the failure policy.
    pub fn clean_all(&self, pages: &[PageId]) -> CleanReport {
        let mut report = CleanReport::default();
        for (index, page) in pages.iter().enumerate() {
            match self.clean_page(page) {
                Ok(path) => {
                    archive_info!("Cleaned {page} into {}", path.display());
                    report.cleaned.push(path);
                }
                Err(err) => {
                    archive_error!("Cleaning {page} failed: {err}");
                    report.failures.push(CleanFailure {
                        page: page.clone(),
                        error: err.to_string(),
                    });
                    if self.policy == CleanFailurePolicy::AbortBatch {
                        report.aborted = true;
                        report.skipped = pages[index + 1..].to_vec();
                        if !report.skipped.is_empty() {
                            archive_warn!(
                                "Cleaning pass aborted, {} pages left uncleaned",
                                report.skipped.len()
                            );
                        }
                        break;
                    }
                }
            }
        }
        report
    }

    pub fn clean_page(&self, page: &PageId) -> Result<PathBuf, CleanError> {
        let raw_path = self
            .layout
            .html_dir
            .join(self.naming.page_filename(page, ArtifactKind::RawHtml));
        if !raw_path.is_file() {
            return Err(CleanError::MissingRaw { path: raw_path });
        }
        let raw = fs::read_to_string(&raw_path).map_err(|source| CleanError::Read {
            path: raw_path.clone(),
            source,
        })?;

        let cleaned = self.transform(page, &raw)?;
        let writer = AtomicFileWriter::new(self.layout.html_dir.clone());
        let path = writer.write(
            &self.naming.page_filename(page, ArtifactKind::CleanedHtml),
            cleaned.as_bytes(),
        )?;
        Ok(path)
    }

    /// Rewrites and re-templates one raw document without touching the disk.
    pub fn transform(&self, page: &PageId, raw: &str) -> Result<String, CleanError> {
        let events = parse_events(raw)?;
        let body = self.rewrite_body(&events[content_range(&events)])?;

        let page_name = self.naming.flatten(page.as_str());
        let source_url = self.site.page_url(page);
        let placeholders = self.naming.placeholders();
        let rendered = CleanedPage {
            title: page.as_str(),
            server: &self.site.server,
            module: &self.site.module,
            page_name: &page_name,
            slash: &placeholders.slash,
            space: &placeholders.space,
            source_url: &source_url,
            body: &body,
        };
        rendered
            .render()
            .map_err(|err| CleanError::Render(err.to_string()))
    }

    fn rewrite_body(&self, events: &[Event<'static>]) -> Result<String, CleanError> {
        let links =
            LinkRewriter::new(self.site, self.naming, self.layout, self.archived.as_ref());
        let mut writer = Writer::new(Vec::new());
        for event in events {
            let out = match event {
                Event::Start(start) => Event::Start(links.rewrite_element(start)?),
                Event::Empty(start) => Event::Empty(links.rewrite_element(start)?),
                Event::Decl(_) | Event::DocType(_) | Event::PI(_) | Event::Eof => continue,
                other => other.clone(),
            };
            writer
                .write_event(out)
                .map_err(|err| CleanError::Markup(err.to_string()))?;
        }
        String::from_utf8(writer.into_inner()).map_err(|err| CleanError::Markup(err.to_string()))
    }
}

/// Maps wiki URLs onto archived filenames.
struct LinkRewriter<'a> {
    server: &'a str,
    wiki_prefix: String,
    attachment_prefixes: [String; 2],
    attachment_href_prefix: String,
    naming: &'a FileNaming,
    archived: Option<&'a HashSet<PageId>>,
}

impl<'a> LinkRewriter<'a> {
    fn new(
        site: &'a SiteInfo,
        naming: &'a FileNaming,
        layout: &OutputLayout,
        archived: Option<&'a HashSet<PageId>>,
    ) -> Self {
        let base = site.module_base();
        Self {
            server: site.server(),
            wiki_prefix: format!("{base}/wiki/"),
            attachment_prefixes: [
                format!("{base}/attachment/wiki/"),
                format!("{base}/raw-attachment/wiki/"),
            ],
            attachment_href_prefix: layout.attachment_href_prefix(),
            naming,
            archived,
        }
    }

    fn rewrite_element(&self, start: &BytesStart<'_>) -> Result<BytesStart<'static>, CleanError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut rebuilt = BytesStart::new(name);
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| CleanError::Markup(err.to_string()))?;
            if let key @ (b"href" | b"src") = attribute.key.as_ref() {
                let value = attribute
                    .unescape_value()
                    .map_err(|err| CleanError::Markup(err.to_string()))?;
                if let Some(local) = self.rewrite(&value) {
                    let key = String::from_utf8_lossy(key).into_owned();
                    rebuilt.push_attribute((key.as_str(), local.as_str()));
                    continue;
                }
            }
            rebuilt.push_attribute(attribute);
        }
        Ok(rebuilt)
    }

    fn rewrite(&self, href: &str) -> Option<String> {
        let path = href
            .strip_prefix(self.server)
            .filter(|rest| rest.starts_with('/'))
            .unwrap_or(href);
        let (path, fragment) = match path.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (path, None),
        };

        if let Some(id) = path.strip_prefix(self.wiki_prefix.as_str()) {
            // Links carrying a query are wiki actions (edit, history), not pages.
            if id.is_empty() || id.contains('?') {
                return None;
            }
            let page = PageId::new(percent_decode(id));
            if !self.is_archived(&page) {
                return self.on_server(href);
            }
            let mut local = href_escape(&self.naming.page_filename(&page, ArtifactKind::CleanedHtml));
            if let Some(fragment) = fragment {
                local.push('#');
                local.push_str(fragment);
            }
            return Some(local);
        }

        for prefix in &self.attachment_prefixes {
            if let Some(name) = path.strip_prefix(prefix.as_str()) {
                let name = name.split('?').next().unwrap_or(name);
                if name.is_empty() {
                    return None;
                }
                let name = percent_decode(name);
                let owner = name.rsplit_once('/').map_or(name.as_str(), |(page, _)| page);
                if !self.is_archived(&PageId::new(owner)) {
                    return self.on_server(href);
                }
                let filename = self.naming.attachment_filename(&name);
                return Some(format!("{}{}", self.attachment_href_prefix, href_escape(&filename)));
            }
        }
        None
    }

    fn is_archived(&self, page: &PageId) -> bool {
        self.archived.is_none_or(|pages| pages.contains(page))
    }

    /// Site-relative links would dangle in the archive; make them absolute.
    fn on_server(&self, href: &str) -> Option<String> {
        if href.starts_with('/') && !self.server.is_empty() {
            Some(format!("{}{href}", self.server))
        } else {
            None
        }
    }
}

fn percent_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// Placeholder tokens such as `%20` must survive as literal filename characters.
fn href_escape(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            other => out.push(other),
        }
    }
    out
}

/// Strict parse: mismatched or unclosed elements are errors.
fn parse_events(raw: &str) -> Result<Vec<Event<'static>>, CleanError> {
    let mut reader = Reader::from_str(raw);
    let mut events = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.read_event();
        let event = event.map_err(|err| {
            CleanError::Markup(format!("at byte {}: {err}", reader.buffer_position()))
        })?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
        events.push(event.into_owned());
    }

    if depth != 0 {
        return Err(CleanError::Markup("unclosed element at end of document".to_string()));
    }
    if !events
        .iter()
        .any(|event| matches!(event, Event::Start(_) | Event::Empty(_)))
    {
        return Err(CleanError::Markup("no root element".to_string()));
    }
    Ok(events)
}

/// Inner content of the wiki page element, else of `<body>`, else everything.
fn content_range(events: &[Event<'static>]) -> Range<usize> {
    let root = events
        .iter()
        .position(|event| matches!(event, Event::Start(start) if has_class(start, "wikipage")))
        .or_else(|| {
            events
                .iter()
                .position(|event| matches!(event, Event::Start(start) if start.name().as_ref() == b"body"))
        });
    match root {
        Some(start) => start + 1..matching_end(events, start),
        None => 0..events.len(),
    }
}

fn matching_end(events: &[Event<'static>], start: usize) -> usize {
    let mut depth = 0usize;
    for (index, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return index;
                }
            }
            _ => {}
        }
    }
    events.len()
}

fn has_class(start: &BytesStart<'_>, class: &str) -> bool {
    start.attributes().flatten().any(|attribute| {
        attribute.key.as_ref() == b"class"
            && String::from_utf8_lossy(&attribute.value)
                .split_whitespace()
                .any(|token| token == class)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_escape_protects_placeholders() {
        assert_eq!(href_escape("C%20D.html"), "C%2520D.html");
        assert_eq!(href_escape("A**B.html"), "A**B.html");
    }

    #[test]
    fn content_range_prefers_wikipage_div() {
        let events = parse_events(
            "<html><body><p>nav</p><div class=\"wikipage searchable\"><p>x</p></div></body></html>",
        )
        .unwrap();
        let range = content_range(&events);
        assert!(matches!(&events[range.start], Event::Start(s) if s.name().as_ref() == b"p"));
        assert!(matches!(&events[range.end], Event::End(e) if e.name().as_ref() == b"div"));
    }

    #[test]
    fn unclosed_document_is_rejected() {
        assert!(matches!(parse_events("<html><body>"), Err(CleanError::Markup(_))));
        assert!(matches!(parse_events("just text"), Err(CleanError::Markup(_))));
    }
}
