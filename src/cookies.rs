//! Persistent cookie jar backing the session transport.
//!
//! Plugged into reqwest as a [`HttpCookieStore`], so every request carries
//! the matching cookies and every `Set-Cookie` lands here. Matching and
//! storage are `cookie_store`'s; this type adds the profile file and two
//! admission rules:
//! - session-scoped names (the per-playback `_mediaAuth`) never enter the jar
//! - a `Domain` attribute naming a single label (`Domain=com`) is refused
//!
//! The file is `cookie_store` JSON. Loading ignores expiry and saving keeps
//! non-persistent cookies, so a browse session survives restarts.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use cookie_store::{CookieStore, RawCookie};
use reqwest::cookie::CookieStore as HttpCookieStore;
use reqwest::header::HeaderValue;
use reqwest_cookie_store::CookieStoreMutex;
use tracing::{debug, warn};
use url::Url;

/// Cookie jar persisted to the profile's cookie file.
pub struct PersistentCookieJar {
    path: PathBuf,
    store: CookieStoreMutex,
    /// Cookies with these names are scoped to one playback session and
    /// never enter the jar.
    session_scoped: Vec<String>,
}

impl PersistentCookieJar {
    /// Load the jar from `path`. A missing or unreadable file yields an
    /// empty jar.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let store = match File::open(&path) {
            Ok(file) => cookie_store::serde::json::load_all(BufReader::new(file)).unwrap_or_else(|e| {
                warn!(path = %path.display(), "Could not parse cookie file: {e}");
                CookieStore::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CookieStore::default(),
            Err(e) => {
                warn!(path = %path.display(), "Could not read cookie file: {e}");
                CookieStore::default()
            }
        };

        debug!(path = %path.display(), count = store.iter_any().count(), "Cookie jar loaded");

        Self {
            path,
            store: CookieStoreMutex::new(store),
            session_scoped: Vec::new(),
        }
    }

    /// Exclude cookies named `names` from the jar.
    #[must_use]
    pub fn with_session_scoped(mut self, names: &[&str]) -> Self {
        self.session_scoped = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of cookies currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_any()
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Cookie` header value for a request to `url`.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.store
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Write every cookie, expired and non-persistent ones included, to
    /// disk, overwriting the file.
    pub fn save(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let mut writer = BufWriter::new(File::create(&self.path)?);
        cookie_store::serde::json::save_incl_expired_and_nonpersistent(&store, &mut writer)
            .map_err(std::io::Error::other)?;
        writer.flush()
    }

    /// Whether a `Set-Cookie` received from `url` may enter the jar.
    fn admits(&self, header: &HeaderValue, url: &Url) -> bool {
        let Some(cookie) = header.to_str().ok().and_then(|h| RawCookie::parse(h).ok()) else {
            return false;
        };

        if self.session_scoped.iter().any(|n| n == cookie.name()) {
            debug!(name = %cookie.name(), "Session-scoped cookie kept out of the jar");
            return false;
        }

        if let Some(domain) = cookie.domain() {
            let domain = domain.trim_start_matches('.');
            if !domain.contains('.') && url.host_str() != Some(domain) {
                warn!(name = %cookie.name(), domain, host = ?url.host_str(), "Refusing cookie for a top-level domain");
                return false;
            }
        }

        true
    }
}

impl HttpCookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let mut admitted = cookie_headers.filter(|header| self.admits(header, url));
        self.store.set_cookies(&mut admitted, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.store.cookies(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn jar() -> (tempfile::TempDir, PersistentCookieJar) {
        let dir = tempfile::tempdir().unwrap();
        let jar = PersistentCookieJar::load(dir.path().join("cookie_file"));
        (dir, jar)
    }

    fn set(jar: &PersistentCookieJar, header: &'static str, origin: &str) {
        let value = HeaderValue::from_static(header);
        jar.set_cookies(&mut std::iter::once(&value), &url(origin));
    }

    #[test]
    fn sends_only_to_matching_host_and_path() {
        let (_dir, jar) = jar();
        set(&jar, "JSESSIONID=s1", "https://www.espnplayer.com/secure/authenticate");
        set(&jar, "site=1; Domain=espnplayer.com; Path=/", "https://www.espnplayer.com/secure/authenticate");

        let secure = jar.cookie_header(&url("https://www.espnplayer.com/secure/x")).unwrap();
        assert!(secure.contains("JSESSIONID=s1"));
        assert!(secure.contains("site=1"));
        assert_eq!(
            jar.cookie_header(&url("https://api.espnplayer.com/schedule")).as_deref(),
            Some("site=1")
        );
        assert_eq!(jar.cookie_header(&url("https://www.espnplayer.com/schedule")).as_deref(), Some("site=1"));
        assert!(jar.cookie_header(&url("https://example.com/")).is_none());
    }

    #[test]
    fn foreign_domain_is_rejected() {
        let (_dir, jar) = jar();
        set(&jar, "evil=1; Domain=example.com", "https://www.espnplayer.com/");
        assert!(jar.is_empty());
    }

    #[test]
    fn top_level_domain_is_rejected() {
        let (dir, jar) = jar();
        set(&jar, "evil=1; Domain=com; Path=/", "https://www.espnplayer.com/secure/authenticate");
        set(&jar, "also=1; Domain=.com; Path=/", "https://www.espnplayer.com/secure/authenticate");
        jar.save().unwrap();

        assert!(jar.is_empty());
        assert!(jar.cookie_header(&url("https://cdn.example.com/live/master.m3u8")).is_none());
        let reloaded = PersistentCookieJar::load(dir.path().join("cookie_file"));
        assert!(reloaded.cookie_header(&url("https://cdn.example.com/live/master.m3u8")).is_none());
    }

    #[test]
    fn session_scoped_names_stay_out() {
        let (dir, jar) = jar();
        let jar = jar.with_session_scoped(&["_mediaAuth"]);
        set(&jar, "_mediaAuth=secret; path=/", "http://neulion.go.com/espngeo/startSession");
        set(&jar, "geo=us; path=/", "http://neulion.go.com/espngeo/startSession");
        jar.save().unwrap();

        assert_eq!(jar.len(), 1);
        let saved = std::fs::read_to_string(dir.path().join("cookie_file")).unwrap();
        assert!(saved.contains("geo"));
        assert!(!saved.contains("_mediaAuth"));
    }

    #[test]
    fn max_age_zero_deletes() {
        let (_dir, jar) = jar();
        set(&jar, "token=1; Path=/", "https://www.espnplayer.com/");
        set(&jar, "token=; Path=/; Max-Age=0", "https://www.espnplayer.com/");
        assert!(jar.cookie_header(&url("https://www.espnplayer.com/")).is_none());
    }

    #[test]
    fn save_and_reload_keeps_session_cookies() {
        let (dir, jar) = jar();
        set(&jar, "session=abc; Path=/", "https://www.espnplayer.com/");
        set(&jar, "persistent=xyz; Path=/; Max-Age=3600", "https://www.espnplayer.com/");
        jar.save().unwrap();

        let reloaded = PersistentCookieJar::load(dir.path().join("cookie_file"));
        assert_eq!(reloaded.len(), 2);
        let header = reloaded.cookie_header(&url("https://www.espnplayer.com/")).unwrap();
        assert!(header.contains("session=abc"));
        assert!(header.contains("persistent=xyz"));
    }

    #[test]
    fn unreadable_file_yields_empty_jar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookie_file");
        std::fs::write(&path, "# Netscape HTTP Cookie File\nnot json at all\n").unwrap();

        let jar = PersistentCookieJar::load(&path);
        assert!(jar.is_empty());
        jar.save().unwrap();
        assert!(PersistentCookieJar::load(&path).is_empty());
    }
}
