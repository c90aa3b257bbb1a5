//! Archiver engine: transports, link discovery, persistence and the archive pipeline.
mod backend;
mod clean;
mod decode;
mod fetcher;
mod http;
mod index_backend;
mod links;
mod orchestrator;
mod persist;
mod rpc_backend;
mod types;
pub mod xmlrpc;

pub use backend::WikiBackend;
pub use clean::{CleanError, CleanFailure, CleanFailurePolicy, CleanReport, HtmlCleaner, SiteInfo};
pub use decode::{decode_text, DecodeError, DecodedText};
pub use fetcher::ContentFetcher;
pub use http::{BasicAuth, FetchSettings, HttpClient};
pub use index_backend::{HtmlIndexBackend, IndexSite};
pub use links::{anchor_targets, CandidateLink, DedupPolicy, LinkExtractor};
pub use orchestrator::{ArchiveContext, ArchiveError, Discovery, Orchestrator, RunReport};
pub use persist::{ensure_output_dir, AtomicFileWriter, OutputLayout, PersistError};
pub use rpc_backend::{ConnectError, RpcServer, XmlRpcBackend};
pub use types::{
    ContentArtifact, ContentKind, FailureKind, FetchError, FetchFailure, FetchMetadata,
    FetchOutcome, FetchOutput, SavedArtifact,
};
