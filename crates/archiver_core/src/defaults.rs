use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::PageId;

const RESERVED_ELEMENT: &[u8] = b"tracwikiword";
const NAME_ATTRIBUTE: &[u8] = b"name";

/// Configuration problems. Always fatal: nothing has touched the network yet.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },
    #[error("missing {0}")]
    Missing(String),
}

impl ConfigError {
    pub fn malformed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// System pages shipped with every wiki install. These are never archived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultPageSet {
    names: BTreeSet<PageId>,
}

impl DefaultPageSet {
    /// Reads the reserved-page XML document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let xml = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_xml(&xml).map_err(|err| match err {
            ConfigError::Malformed { message, .. } => {
                ConfigError::malformed(path.display().to_string(), message)
            }
            other => other,
        })
    }

    /// Collects the `name` attribute of every `<tracwikiword>` element, at any depth.
    pub fn parse_xml(xml: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_str(xml);
        let mut names = BTreeSet::new();
        let mut depth = 0usize;
        let mut saw_element = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) => {
                    depth += 1;
                    saw_element = true;
                    collect_reserved(&element, &mut names)?;
                }
                Ok(Event::Empty(element)) => {
                    saw_element = true;
                    collect_reserved(&element, &mut names)?;
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(ConfigError::malformed(
                        "default page list",
                        format!("at byte {}: {err}", reader.buffer_position()),
                    ));
                }
            }
        }

        if !saw_element {
            return Err(ConfigError::malformed("default page list", "no root element"));
        }
        if depth != 0 {
            return Err(ConfigError::malformed("default page list", "unclosed element"));
        }
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PageId>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, page: &PageId) -> bool {
        self.names.contains(page)
    }

    /// True when any reserved name occurs inside `text`.
    pub fn any_within(&self, text: &str) -> bool {
        self.names.iter().any(|name| text.contains(name.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageId> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn collect_reserved(
    element: &BytesStart<'_>,
    names: &mut BTreeSet<PageId>,
) -> Result<(), ConfigError> {
    if element.name().as_ref() != RESERVED_ELEMENT {
        return Ok(());
    }
    for attribute in element.attributes() {
        let attribute = attribute
            .map_err(|err| ConfigError::malformed("default page list", err.to_string()))?;
        if attribute.key.as_ref() == NAME_ATTRIBUTE {
            let value = attribute
                .unescape_value()
                .map_err(|err| ConfigError::malformed("default page list", err.to_string()))?;
            names.insert(PageId::new(value.into_owned()));
            return Ok(());
        }
    }
    Err(ConfigError::malformed(
        "default page list",
        "<tracwikiword> without a name attribute",
    ))
}
