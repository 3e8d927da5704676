//! Session transport
//!
//! Blocking HTTP client shared by every endpoint call:
//! - Persistent cookie jar attached to every request, saved after every call
//! - Uniform request/response logging (bodies only in debug mode)
//! - Error classification: [`Error::Transport`] vs [`Error::Http`]
//! - Tagged body decoding via [`ResponseBody`]

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tracing::{debug, instrument, warn};

use crate::body::ResponseBody;
use crate::cookies::PersistentCookieJar;
use crate::error::{Error, Result};

const REDACTED: &str = "********";

/// Methods the backends are spoken to with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_reqwest().as_str())
    }
}

/// One outgoing request: query params, form payload and extra headers.
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    url: String,
    params: Vec<(String, String)>,
    payload: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            payload: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    /// Add a query parameter.
    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Add a form-encoded payload field.
    #[must_use]
    pub fn form(mut self, key: &str, value: impl Into<String>) -> Self {
        self.payload.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }
}

/// A cookie set by a response, as the server sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
}

impl From<reqwest::cookie::Cookie<'_>> for SetCookie {
    fn from(cookie: reqwest::cookie::Cookie<'_>) -> Self {
        Self {
            name: cookie.name().to_string(),
            value: cookie.value().to_string(),
            domain: cookie.domain().map(str::to_string),
            path: cookie.path().map(str::to_string),
        }
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    /// Body as received.
    pub raw: String,
    pub body: ResponseBody,
    /// Every `Set-Cookie` on the response, including session-scoped ones
    /// the jar refuses to keep.
    pub set_cookies: Vec<SetCookie>,
}

impl Response {
    pub fn cookie(&self, name: &str) -> Option<&SetCookie> {
        self.set_cookies.iter().find(|c| c.name == name)
    }
}

/// HTTP session with a persistent cookie jar.
pub struct Session {
    client: Client,
    jar: Arc<PersistentCookieJar>,
    debug: bool,
}

impl Session {
    /// Open a session whose cookies persist to `cookie_file`.
    pub fn new(cookie_file: impl Into<PathBuf>, debug: bool) -> Result<Self> {
        Self::with_jar(PersistentCookieJar::load(cookie_file), debug)
    }

    pub fn with_jar(jar: PersistentCookieJar, debug: bool) -> Result<Self> {
        let jar = Arc::new(jar);

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .use_rustls_tls()
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, jar, debug })
    }

    pub fn jar(&self) -> &PersistentCookieJar {
        &self.jar
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Send `request` and decode the response.
    ///
    /// The cookie jar is saved once the exchange completes, whatever its
    /// outcome.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] when no response arrived, [`Error::Http`] for a
    /// non-2xx status.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn request(&self, request: Request) -> Result<Response> {
        if !request.params.is_empty() {
            debug!(params = ?redact(&request.params), "Params");
        }
        if !request.payload.is_empty() {
            debug!(payload = ?redact(&request.payload), "Payload");
        }
        if !request.headers.is_empty() {
            debug!(headers = ?request.headers, "Headers");
        }

        let mut builder = self
            .client
            .request(request.method.as_reqwest(), &request.url);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        if !request.payload.is_empty() {
            builder = builder.form(&request.payload);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let sent = builder.send();
        self.persist_cookies();

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!("Connection error: {e}");
                return Err(Error::Transport(e));
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let set_cookies: Vec<SetCookie> = response.cookies().map(SetCookie::from).collect();

        if !status.is_success() {
            warn!(status = status.as_u16(), url = %final_url, "HTTP error");
            if self.debug {
                let raw = response.text().unwrap_or_default();
                debug!(body = %raw, "Response body");
            }
            return Err(Error::Http {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let raw = response.text()?;

        debug!(status = status.as_u16(), content_type = ?content_type, bytes = raw.len(), "Response received");
        if self.debug {
            debug!(body = %raw, "Response body");
        }

        let body = ResponseBody::decode(content_type.as_deref(), &raw);

        Ok(Response {
            status: status.as_u16(),
            url: final_url,
            raw,
            body,
            set_cookies,
        })
    }

    fn persist_cookies(&self) {
        if let Err(e) = self.jar.save() {
            warn!(path = %self.jar.path().display(), "Failed to save cookies: {e}");
        }
    }
}

fn redact(fields: &[(String, String)]) -> Vec<(&str, &str)> {
    fields
        .iter()
        .map(|(k, v)| {
            let lower = k.to_ascii_lowercase();
            if lower.contains("password") || lower == "pass" {
                (k.as_str(), REDACTED)
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}
