use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{ArtifactKind, DefaultPageSet, FileNaming, PageId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageListError {
    #[error("pages {first:?} and {second:?} both map to filename {filename:?}")]
    FilenameCollision {
        first: PageId,
        second: PageId,
        filename: String,
    },
}

/// The accepted pages of one run, in discovery order.
///
/// Built once; contains no default page and no duplicate. No two pages share
/// a mapped filename of any kind, since raw and cleaned HTML live side by side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageList {
    pages: Vec<PageId>,
    excluded: usize,
}

impl PageList {
    pub fn build<I>(
        candidates: I,
        defaults: &DefaultPageSet,
        naming: &FileNaming,
    ) -> Result<Self, PageListError>
    where
        I: IntoIterator<Item = PageId>,
    {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut by_filename: HashMap<String, usize> = HashMap::new();
        let mut excluded = 0;

        for page in candidates {
            if defaults.contains(&page) {
                excluded += 1;
                continue;
            }
            if !seen.insert(page.clone()) {
                continue;
            }
            for kind in ArtifactKind::ALL {
                let filename = naming.page_filename(&page, kind);
                match by_filename.get(&filename) {
                    Some(&index) if index != pages.len() => {
                        let first: &PageId = &pages[index];
                        return Err(PageListError::FilenameCollision {
                            first: first.clone(),
                            second: page,
                            filename,
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_filename.insert(filename, pages.len());
                    }
                }
            }
            pages.push(page);
        }

        Ok(Self { pages, excluded })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageId> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Number of candidates dropped because they are default pages.
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    pub fn as_slice(&self) -> &[PageId] {
        &self.pages
    }
}

impl<'a> IntoIterator for &'a PageList {
    type Item = &'a PageId;
    type IntoIter = std::slice::Iter<'a, PageId>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
