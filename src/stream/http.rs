//! Resumable HTTP backend using reqwest's blocking client.
//!
//! A stream over `http://` / `https://` is served by a sequence of HTTP
//! *sessions* (one request + response each). When a response body ends before
//! the expected number of bytes has been delivered, the backend silently opens
//! a new session with `Range: bytes=<next>-` and keeps going; the caller sees
//! one continuous byte stream. Only when a resume attempt makes no forward
//! progress does the failure surface.

use std::io::{Read, SeekFrom};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, RANGE};
use reqwest::redirect::Policy;
use tracing::{debug, warn};

use super::backend::Backend;
use super::error::{StreamError, StreamResult};

/// Redirect ceiling per session.
const MAX_REDIRECTS: usize = 16;

/// Configuration for the HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout in seconds (default: 30).
    pub connect_timeout_secs: u64,
    /// Optional cap on a whole session, headers through body (default: none).
    ///
    /// A session cut off by this cap resumes at the delivered offset like any
    /// other interrupted response, so long transfers stay correct; the cap
    /// bounds how long a single stalled request can block the caller.
    pub session_timeout_secs: Option<u64>,
    /// Authentication configuration.
    pub auth: Option<HttpAuthConfig>,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            session_timeout_secs: None,
            auth: None,
            user_agent: None,
        }
    }
}

/// Authentication configuration for HTTP requests.
#[derive(Debug, Clone)]
pub enum HttpAuthConfig {
    /// Bearer token authentication (e.g., presigned URLs or API tokens).
    Bearer(String),
    /// Custom header-based authentication.
    CustomHeader {
        /// Header name (e.g., "X-API-Key")
        name: String,
        /// Header value
        value: String,
    },
}

/// One request/response lifetime within the logical stream.
struct Session {
    body: Response,
    /// Absolute stream offset at which this response begins.
    start: u64,
    /// Bytes handed to the caller from this response so far.
    delivered: u64,
}

/// Read/seek backend over an HTTP URL with transparent resumption.
pub struct HttpBackend {
    url: String,
    client: Client,
    config: HttpConfig,
    /// Absolute offset of the next byte the caller will receive.
    offset: u64,
    session: Option<Session>,
    /// Total resource length, once a response has revealed it.
    total: Option<u64>,
}

impl HttpBackend {
    /// Opens `url` with default configuration.
    ///
    /// # Errors
    ///
    /// Fails if the initial request cannot be sent or the server answers with
    /// a non-2xx status; see [`StreamError`] for the status mapping.
    pub fn open(url: impl Into<String>) -> StreamResult<Self> {
        Self::with_config(url, HttpConfig::default())
    }

    /// Opens `url` with custom configuration.
    pub fn with_config(url: impl Into<String>, config: HttpConfig) -> StreamResult<Self> {
        let url = url.into();

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(config.session_timeout_secs.map(Duration::from_secs))
            .redirect(Policy::limited(MAX_REDIRECTS));

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        } else {
            builder = builder.user_agent(concat!("hstream/", env!("CARGO_PKG_VERSION")));
        }

        let client = builder
            .build()
            .map_err(|e| StreamError::Io(format!("building HTTP client: {e}")))?;

        let mut backend = Self {
            url,
            client,
            config,
            offset: 0,
            session: None,
            total: None,
        };

        // Validate the resource up front; the response also serves the first
        // reads, so nothing is wasted.
        backend.session = backend.open_session(0)?;
        Ok(backend)
    }

    /// Total resource length, if any response so far has revealed it.
    #[must_use]
    pub fn total_size(&self) -> Option<u64> {
        self.total
    }

    fn apply_auth(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.config.auth {
            Some(HttpAuthConfig::Bearer(token)) => {
                request.header(AUTHORIZATION, format!("Bearer {token}"))
            }
            Some(HttpAuthConfig::CustomHeader { name, value }) => request.header(name, value),
            None => request,
        }
    }

    /// Starts a session delivering bytes from absolute offset `ofs`.
    ///
    /// Returns `Ok(None)` when `ofs` is exactly the end of the resource (the
    /// server answered 416 and the known total confirms there is nothing
    /// left), which the caller treats as EOF.
    fn open_session(&mut self, ofs: u64) -> StreamResult<Option<Session>> {
        let mut request = self.client.get(&self.url);
        if ofs > 0 {
            request = request.header(RANGE, format!("bytes={ofs}-"));
        }
        request = self.apply_auth(request);

        let response = request.send().map_err(|e| self.transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            let total = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total)
                .or(self.total);
            if total == Some(ofs) {
                self.total = total;
                return Ok(None);
            }
            return Err(StreamError::Invalid(format!(
                "range at byte {ofs} not satisfiable for {}",
                self.url
            )));
        }

        if !status.is_success() {
            return Err(status_error(status, &self.url));
        }
        if ofs > 0 && status != StatusCode::PARTIAL_CONTENT {
            return Err(StreamError::Invalid(format!(
                "expected a 206 partial response at byte {ofs}, got {status} from {}",
                self.url
            )));
        }

        if status == StatusCode::PARTIAL_CONTENT {
            let from_header = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total);
            if let Some(total) = from_header.or_else(|| response.content_length().map(|n| ofs + n))
            {
                self.total = Some(total);
            }
        } else if let Some(len) = response.content_length() {
            self.total = Some(len);
        }

        debug!(url = %self.url, ofs, total = ?self.total, %status, "HTTP session opened");

        Ok(Some(Session {
            body: response,
            start: ofs,
            delivered: 0,
        }))
    }

    fn transport_error(&self, e: &reqwest::Error) -> StreamError {
        if e.is_timeout() {
            StreamError::Timeout(format!("{}: {e}", self.url))
        } else {
            StreamError::Io(format!("{}: {e}", self.url))
        }
    }
}

impl Backend for HttpBackend {
    fn source_id(&self) -> &str {
        &self.url
    }

    fn read(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.session.is_none() {
                match self.open_session(self.offset)? {
                    Some(s) => self.session = Some(s),
                    None => return Ok(0),
                }
            }
            let Some(session) = self.session.as_mut() else {
                continue;
            };

            match session.body.read(buf) {
                Ok(0) => {
                    let reached = session.start + session.delivered;
                    let progressed = session.delivered > 0;
                    self.session = None;
                    match self.total {
                        // The body ended cleanly but short of the full
                        // resource; resume where it stopped.
                        Some(total) if reached < total => {
                            if progressed {
                                warn!(
                                    url = %self.url,
                                    reached,
                                    total,
                                    "response ended early, resuming with a range request"
                                );
                                continue;
                            }
                            return Err(StreamError::Truncated { offset: reached });
                        }
                        _ => return Ok(0),
                    }
                }
                Ok(n) => {
                    session.delivered += n as u64;
                    self.offset += n as u64;
                    return Ok(n);
                }
                Err(e) => {
                    let reached = session.start + session.delivered;
                    let progressed = session.delivered > 0;
                    self.session = None;
                    if progressed {
                        warn!(
                            url = %self.url,
                            reached,
                            error = %e,
                            "transport error mid-response, resuming with a range request"
                        );
                        continue;
                    }
                    return Err(match e.kind() {
                        std::io::ErrorKind::TimedOut => {
                            StreamError::Timeout(format!("{}: {e}", self.url))
                        }
                        std::io::ErrorKind::UnexpectedEof => {
                            StreamError::Truncated { offset: reached }
                        }
                        _ => StreamError::Io(format!("{}: {e}", self.url)),
                    });
                }
            }
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        let target = match pos {
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::Current(d) => i128::from(self.offset) + i128::from(d),
            SeekFrom::End(_) => {
                return Err(StreamError::NotSeekable(
                    "cannot seek relative to the end of an HTTP stream".into(),
                ));
            }
        };
        if target < 0 {
            return Err(StreamError::Invalid(
                "seek target before start of stream".into(),
            ));
        }

        // The next read opens a session at the new offset.
        self.offset = target as u64;
        self.session = None;
        Ok(self.offset)
    }

    fn close(&mut self) -> StreamResult<()> {
        self.session = None;
        Ok(())
    }
}

/// Extracts the total length from a `Content-Range` value, accepting both the
/// `bytes 0-99/1234` and `bytes */1234` forms. An unknown total (`/*`) yields
/// `None`.
fn content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.rsplit_once('/')?;
    total.trim().parse().ok()
}

fn status_error(status: StatusCode, url: &str) -> StreamError {
    match status.as_u16() {
        401 | 403 | 407 => StreamError::PermissionDenied(format!("HTTP {status} for {url}")),
        404 | 410 => StreamError::NotFound(url.to_string()),
        408 | 504 => StreamError::Timeout(format!("HTTP {status} for {url}")),
        503 => StreamError::TryAgain(format!("HTTP {status} for {url}")),
        s if (400..500).contains(&s) => StreamError::Invalid(format!("HTTP {status} for {url}")),
        _ => StreamError::Io(format!("HTTP {status} for {url}")),
    }
}
