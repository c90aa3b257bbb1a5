use std::fmt;

use archiver_core::{DefaultPageSet, PageId};
use archiver_logging::{archive_debug, archive_info};
use thiserror::Error;
use url::Url;

use crate::xmlrpc::{decode_response, encode_call, RpcError, Value};
use crate::{decode_text, BasicAuth, FailureKind, FetchError, FetchSettings, HttpClient, WikiBackend};

/// Server location and the static credential triple.
#[derive(Clone, PartialEq, Eq)]
pub struct RpcServer {
    /// Scheme and host, optionally with a base path: `https://trac.example.org`.
    pub url: String,
    /// Trac environment name, e.g. `project`.
    pub module: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcServer")
            .field("url", &self.url)
            .field("module", &self.module)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RpcServer {
    /// `{url}/{module}/login/xmlrpc`, or `{url}/{module}/xmlrpc` without a user.
    pub fn endpoint(&self) -> Result<String, ConnectError> {
        let invalid = |reason: String| ConnectError::InvalidServerUrl {
            url: self.url.clone(),
            reason,
        };
        let mut parsed = Url::parse(self.url.trim()).map_err(|err| invalid(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {:?}", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }
        // Credentials travel in the Authorization header, never in the URL.
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);
        parsed.set_query(None);
        parsed.set_fragment(None);

        let base = parsed.as_str().trim_end_matches('/');
        let module = self.module.trim_matches('/');
        let tail = if self.user.is_empty() {
            "xmlrpc"
        } else {
            "login/xmlrpc"
        };
        if module.is_empty() {
            Ok(format!("{base}/{tail}"))
        } else {
            Ok(format!("{base}/{module}/{tail}"))
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid server url {url:?}: {reason}")]
    InvalidServerUrl { url: String, reason: String },
    #[error("handshake with {endpoint} failed: {source}")]
    Handshake {
        endpoint: String,
        #[source]
        source: FetchError,
    },
    #[error("cannot build http client: {0}")]
    Client(#[source] FetchError),
}

impl From<RpcError> for FetchError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Fault { code, message } => {
                FetchError::new(FailureKind::RpcFault { code }, message)
            }
            other => FetchError::new(FailureKind::Protocol, other.to_string()),
        }
    }
}

/// Talks to the wiki's XML-RPC plugin.
#[derive(Debug, Clone)]
pub struct XmlRpcBackend {
    http: HttpClient,
    endpoint: String,
}

impl XmlRpcBackend {
    /// Builds the client and verifies the connection with
    /// `wiki.getRPCVersionSupported`. Any failure here is fatal for the run.
    pub async fn connect(server: &RpcServer, settings: FetchSettings) -> Result<Self, ConnectError> {
        let endpoint = server.endpoint()?;
        let mut http = HttpClient::new(settings).map_err(ConnectError::Client)?;
        if !server.user.is_empty() {
            http = http.with_auth(BasicAuth {
                user: server.user.clone(),
                password: server.password.clone(),
            });
        }

        let backend = Self { http, endpoint };
        let version = backend
            .call("wiki.getRPCVersionSupported", &[])
            .await
            .map_err(|source| ConnectError::Handshake {
                endpoint: backend.endpoint.clone(),
                source,
            })?;
        match version {
            Value::Int(version) => {
                archive_info!("Connected to {} (wiki RPC version {version})", backend.endpoint)
            }
            other => archive_info!(
                "Connected to {} (wiki RPC version reported as {})",
                backend.endpoint,
                other.type_name()
            ),
        }
        Ok(backend)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: &[Value]) -> Result<Value, FetchError> {
        archive_debug!("XML-RPC {method}");
        let output = self.http.post_xml(&self.endpoint, encode_call(method, params)).await?;
        let decoded = decode_text(&output.bytes, output.metadata.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        Ok(decode_response(&decoded.text)?)
    }
}

#[async_trait::async_trait]
impl WikiBackend for XmlRpcBackend {
    fn describe(&self) -> String {
        format!("XML-RPC at {}", self.endpoint)
    }

    async fn list_pages(&self, _defaults: &DefaultPageSet) -> Result<Vec<PageId>, FetchError> {
        let names = self.call("wiki.getAllPages", &[]).await?.into_string_list()?;
        Ok(names.into_iter().map(PageId::new).collect())
    }

    async fn page_source(&self, page: &PageId) -> Result<String, FetchError> {
        let text = self
            .call("wiki.getPage", &[Value::from(page.as_str())])
            .await?
            .into_string()?;
        Ok(text)
    }

    async fn page_html(&self, page: &PageId) -> Result<String, FetchError> {
        let html = self
            .call("wiki.getPageHTML", &[Value::from(page.as_str())])
            .await?
            .into_string()?;
        Ok(html)
    }

    async fn list_attachments(&self, page: &PageId) -> Result<Vec<String>, FetchError> {
        let names = self
            .call("wiki.listAttachments", &[Value::from(page.as_str())])
            .await?
            .into_string_list()?;
        Ok(names)
    }

    async fn attachment(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .call("wiki.getAttachment", &[Value::from(name)])
            .await?
            .into_bytes()?;
        Ok(bytes)
    }
}
