use std::path::PathBuf;

use archiver_core::{ModeError, PageId, RunModes};
use archiver_logging::Verbosity;
use clap::{Parser, ValueEnum};

use crate::config::DiscoveryMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryArg {
    /// Enumerate pages through the XML-RPC plugin
    Rpc,
    /// Scrape the wiki's title index
    Index,
}

impl From<DiscoveryArg> for DiscoveryMode {
    fn from(arg: DiscoveryArg) -> Self {
        match arg {
            DiscoveryArg::Rpc => DiscoveryMode::Rpc,
            DiscoveryArg::Index => DiscoveryMode::Index,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "wiki-archiver",
    author,
    version,
    about = "Archive the pages of a Trac wiki to local files",
    long_about = None
)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "archiver.ron")]
    pub config: PathBuf,

    /// Only print warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print every request and link decision
    #[arg(short, long)]
    pub verbose: bool,

    /// Download wiki source text
    #[arg(long)]
    pub source: bool,

    /// Download rendered html and clean it
    #[arg(long)]
    pub html: bool,

    /// Download attachments
    #[arg(long = "att")]
    pub attachments: bool,

    /// Only clean html downloaded earlier
    #[arg(long)]
    pub clean: bool,

    /// Download everything [default]
    #[arg(long)]
    pub all: bool,

    /// Override the discovery mode of the configuration
    #[arg(long, value_enum)]
    pub discovery: Option<DiscoveryArg>,

    /// Server URL
    #[arg(long, env = "ARCHIVER_SERVER")]
    pub server: Option<String>,

    /// User name for the XML-RPC login endpoint
    #[arg(long, env = "ARCHIVER_USER")]
    pub user: Option<String>,

    #[arg(long, env = "ARCHIVER_PASSWORD", hide = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Archive only these pages instead of discovering them
    #[arg(value_name = "PAGE")]
    pub pages: Vec<String>,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    pub fn modes(&self) -> Result<RunModes, ModeError> {
        RunModes::from_flags(self.all, self.source, self.html, self.attachments, self.clean)
    }

    pub fn explicit_pages(&self) -> Vec<PageId> {
        self.pages.iter().map(|page| PageId::new(page.as_str())).collect()
    }
}
