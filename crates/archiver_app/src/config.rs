use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use archiver_core::{ConfigError, Extensions, FileNaming, Placeholders};
use archiver_engine::{
    ArchiveContext, CleanFailurePolicy, DedupPolicy, FetchSettings, IndexSite, OutputLayout,
    RpcServer, SiteInfo,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMode {
    #[default]
    Rpc,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub source_dir: PathBuf,
    pub html_dir: PathBuf,
    /// Defaults to `html_dir`.
    pub attachment_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            html_dir: PathBuf::from("html"),
            attachment_dir: None,
        }
    }
}

/// Contents of `archiver.ron`.
///
/// No `Debug` derive: the struct carries the password.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    pub server: String,
    pub module: String,
    pub user: String,
    pub password: String,
    pub discovery: DiscoveryMode,
    pub index: Option<IndexSite>,
    pub output: OutputConfig,
    pub placeholders: Placeholders,
    pub extensions: Extensions,
    pub default_pages: PathBuf,
    pub timeout_secs: u64,
    pub dedup: DedupPolicy,
    pub clean_failure: CleanFailurePolicy,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            module: String::new(),
            user: String::new(),
            password: String::new(),
            discovery: DiscoveryMode::default(),
            index: None,
            output: OutputConfig::default(),
            placeholders: Placeholders::default(),
            extensions: Extensions::default(),
            default_pages: PathBuf::from("default_pages.xml"),
            timeout_secs: 30,
            dedup: DedupPolicy::default(),
            clean_failure: CleanFailurePolicy::default(),
        }
    }
}

impl ArchiverConfig {
    /// Reads the RON file at `path`. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&text)
            .map_err(|err| ConfigError::malformed(path.display().to_string(), err.to_string()))?;
        let base = path.parent().unwrap_or(Path::new(""));
        config.resolve_paths(base);
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.default_pages);
        resolve(&mut self.output.source_dir);
        resolve(&mut self.output.html_dir);
        if let Some(dir) = self.output.attachment_dir.as_mut() {
            resolve(dir);
        }
    }

    /// Command-line values and environment variables win over the file.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(discovery) = cli.discovery {
            self.discovery = discovery.into();
        }
        if let Some(server) = &cli.server {
            self.server = server.clone();
        }
        if let Some(user) = &cli.user {
            self.user = user.clone();
        }
        if let Some(password) = &cli.password {
            self.password = password.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.placeholders.slash.is_empty() || self.placeholders.space.is_empty() {
            return Err(ConfigError::malformed("placeholders", "tokens must not be empty"));
        }
        if self.placeholders.slash == self.placeholders.space {
            return Err(ConfigError::malformed(
                "placeholders",
                "slash and space tokens must differ",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::malformed("timeout_secs", "must be positive"));
        }
        match self.discovery {
            DiscoveryMode::Rpc if self.server.trim().is_empty() => {
                Err(ConfigError::Missing("server url".to_string()))
            }
            DiscoveryMode::Index if self.index.is_none() => {
                Err(ConfigError::Missing("index settings for Index discovery".to_string()))
            }
            _ => Ok(()),
        }
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout {
            source_dir: self.output.source_dir.clone(),
            html_dir: self.output.html_dir.clone(),
            attachment_dir: self
                .output
                .attachment_dir
                .clone()
                .unwrap_or_else(|| self.output.html_dir.clone()),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..FetchSettings::default()
        }
    }

    pub fn naming(&self) -> FileNaming {
        FileNaming::new(self.placeholders.clone(), self.extensions.clone())
    }

    /// The server the cleaned pages point back to.
    pub fn site_info(&self) -> SiteInfo {
        let server = match (&self.index, self.server.is_empty()) {
            (Some(index), true) => index.root_url.clone(),
            _ => self.server.clone(),
        };
        SiteInfo {
            server,
            module: self.module.clone(),
        }
    }

    pub fn rpc_server(&self) -> RpcServer {
        RpcServer {
            url: self.server.clone(),
            module: self.module.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    pub fn archive_context(&self) -> ArchiveContext {
        ArchiveContext {
            site: self.site_info(),
            naming: self.naming(),
            layout: self.layout(),
            clean_failure: self.clean_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ArchiverConfig::parse("()").unwrap();
        assert!(config == ArchiverConfig::default());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.placeholders.slash, "**");
        assert_eq!(config.layout().attachment_dir, PathBuf::from("html"));
    }

    #[test]
    fn parses_index_settings_and_policies() {
        let config = ArchiverConfig::parse(
            r#"(
                server: "http://trac.example.org",
                module: "proj",
                discovery: Index,
                index: Some((root_url: "http://trac.example.org", wiki_prefix: "/proj/wiki/")),
                dedup: ExactPath,
                clean_failure: SkipPage,
                output: (attachment_dir: Some("files")),
            )"#,
        )
        .unwrap();
        assert_eq!(config.discovery, DiscoveryMode::Index);
        assert_eq!(config.dedup, DedupPolicy::ExactPath);
        assert_eq!(config.clean_failure, CleanFailurePolicy::SkipPage);
        let index = config.index.clone().unwrap();
        assert_eq!(index.index_page, "TitleIndex");
        assert_eq!(config.layout().attachment_dir, PathBuf::from("files"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_resolves_relative_paths_against_the_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archiver.ron");
        fs::write(&path, r#"(server: "http://h", output: (html_dir: "/abs/html"))"#).unwrap();

        let config = ArchiverConfig::load(&path).unwrap();
        assert_eq!(config.default_pages, dir.path().join("default_pages.xml"));
        assert_eq!(config.output.source_dir, dir.path().join("source"));
        assert_eq!(config.output.html_dir, PathBuf::from("/abs/html"));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ArchiverConfig::load(&dir.path().join("nope.ron"));
        assert!(matches!(missing, Err(ConfigError::Unreadable { .. })));

        let path = dir.path().join("bad.ron");
        fs::write(&path, "(timeout_secs: \"soon\")").unwrap();
        assert!(matches!(
            ArchiverConfig::load(&path),
            Err(ConfigError::Malformed { .. })
        ));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let mut config = ArchiverConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        config.server = "http://h".to_string();
        config.placeholders.space = "**".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Malformed { .. })));

        config.placeholders = Placeholders::default();
        config.discovery = DiscoveryMode::Index;
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn command_line_overrides_the_file() {
        let cli = Cli::try_parse_from([
            "wiki-archiver",
            "--server",
            "https://other",
            "--user",
            "bob",
            "--discovery",
            "index",
        ])
        .unwrap();
        let mut config = ArchiverConfig::parse(r#"(server: "http://h", user: "alice")"#).unwrap();
        config.apply_overrides(&cli);
        assert_eq!(config.server, "https://other");
        assert_eq!(config.user, "bob");
        assert_eq!(config.discovery, DiscoveryMode::Index);
    }

    #[test]
    fn site_info_falls_back_to_the_index_root() {
        let mut config = ArchiverConfig::default();
        config.index = Some(IndexSite::new("http://idx", "/wiki/"));
        assert_eq!(config.site_info().server, "http://idx");
        config.server = "http://rpc".to_string();
        assert_eq!(config.site_info().server, "http://rpc");
    }
}
