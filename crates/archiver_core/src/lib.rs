//! Archiver core: pure page-set and naming logic shared by the engine and the CLI.
mod defaults;
mod modes;
mod naming;
mod page;
mod page_list;

pub use defaults::{ConfigError, DefaultPageSet};
pub use modes::{ModeError, RunModes};
pub use naming::{ArtifactKind, Extensions, FileNaming, Placeholders};
pub use page::PageId;
pub use page_list::{PageList, PageListError};
