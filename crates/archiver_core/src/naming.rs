use serde::{Deserialize, Serialize};

use crate::PageId;

/// Substitutes for characters that cannot appear in a flat filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Placeholders {
    pub slash: String,
    pub space: String,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            slash: "**".to_string(),
            space: "%20".to_string(),
        }
    }
}

/// Which per-page file is being named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Source,
    RawHtml,
    CleanedHtml,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Source,
        ArtifactKind::RawHtml,
        ArtifactKind::CleanedHtml,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extensions {
    pub source: String,
    pub raw_html: String,
    pub cleaned_html: String,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            source: ".txt".to_string(),
            raw_html: ".original.html".to_string(),
            cleaned_html: ".html".to_string(),
        }
    }
}

impl Extensions {
    pub fn for_kind(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Source => &self.source,
            ArtifactKind::RawHtml => &self.raw_html,
            ArtifactKind::CleanedHtml => &self.cleaned_html,
        }
    }
}

/// Maps page identifiers and attachment names onto flat filenames.
///
/// `/` becomes `placeholders.slash`, a space becomes `placeholders.space`.
/// The mapping is only injective while identifiers do not already contain a
/// placeholder token; [`FileNaming::is_ambiguous`] reports those.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileNaming {
    placeholders: Placeholders,
    extensions: Extensions,
}

impl FileNaming {
    pub fn new(placeholders: Placeholders, extensions: Extensions) -> Self {
        Self {
            placeholders,
            extensions,
        }
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn flatten(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        for c in name.chars() {
            match c {
                '/' => out.push_str(&self.placeholders.slash),
                ' ' => out.push_str(&self.placeholders.space),
                other => out.push(other),
            }
        }
        out
    }

    pub fn page_filename(&self, page: &PageId, kind: ArtifactKind) -> String {
        let mut name = self.flatten(page.as_str());
        name.push_str(self.extensions.for_kind(kind));
        name
    }

    /// Attachment names already carry their own extension.
    pub fn attachment_filename(&self, attachment: &str) -> String {
        self.flatten(attachment)
    }

    pub fn is_ambiguous(&self, name: &str) -> bool {
        [&self.placeholders.slash, &self.placeholders.space]
            .into_iter()
            .any(|token| !token.is_empty() && name.contains(token.as_str()))
    }
}
