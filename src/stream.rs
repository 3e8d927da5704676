//! Stream resolution for a single airing.
//!
//! Three round trips, all fresh per call:
//!
//! 1. `dgetpkan` issues a short-lived pkan token for the airing
//! 2. `startSession` negotiates a playback session and answers with XML
//!    naming the HLS manifest, plus a `_mediaAuth` cookie needed for
//!    decryption
//! 3. the master playlist is fetched with that cookie and its variants are
//!    mapped by bitrate
//!
//! Every variant URL carries the auth cookie inline (`url|Cookie=…`) so the
//! player can present it on segment requests.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{Endpoints, DEFAULT_CHANNEL};
use crate::error::{Error, Result};
use crate::hls;
use crate::session::{Request, Session, SetCookie};

/// Cookie carrying the media decryption authorization.
pub const MEDIA_AUTH_COOKIE: &str = "_mediaAuth";

const PLAYBACK_SCENARIO: &str = "HTTP_CLOUD_WIRED";
const PLAYER_ID: &str = "neulion";
const PKAN_TYPE: &str = "TOKEN";
const TOKEN_TYPE: &str = "GATEKEEPER";
const SESSION_TTL: &str = "480";

/// Path from the negotiation document root to the media item.
const MEDIA_ITEM_PATH: [&str; 4] = [
    "user-verified-media-response",
    "user-verified-event",
    "user-verified-content",
    "user-verified-media-item",
];
/// Manifest URL fields of the media item, in order of preference.
const MANIFEST_FIELDS: [&str; 3] = ["url", "hls-backup-url", "alt-url"];

/// The `_mediaAuth` cookie captured from session negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAuthCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
}

impl MediaAuthCookie {
    /// Build from a `Set-Cookie`, defaulting the domain to `request_host`
    /// and the path to `/`.
    pub fn from_set_cookie(cookie: &SetCookie, request_host: &str) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            path: cookie.path.clone().unwrap_or_else(|| "/".to_string()),
            domain: cookie
                .domain
                .clone()
                .unwrap_or_else(|| request_host.to_string()),
        }
    }

    /// The `|Cookie=…` suffix appended to playback URLs.
    pub fn url_suffix(&self) -> String {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Cookie", &self.to_string())
            .finish();
        format!("|{encoded}")
    }
}

impl fmt::Display for MediaAuthCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; path={}; domain={};",
            self.name, self.value, self.path, self.domain
        )
    }
}

/// One playable variant of the master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitrateVariant {
    pub bitrate_kbps: u64,
    /// Resolved variant URL, with the auth cookie suffix when one exists.
    pub url: String,
}

impl BitrateVariant {
    /// Selection key: decimal kbps.
    pub fn key(&self) -> String {
        self.bitrate_kbps.to_string()
    }
}

/// Outcome of a resolution. No manifest or no variants is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamResolution {
    pub manifest_url: Option<String>,
    pub bitrates: Vec<BitrateVariant>,
    pub auth_cookie: Option<MediaAuthCookie>,
}

impl StreamResolution {
    pub fn keys(&self) -> Vec<String> {
        self.bitrates.iter().map(BitrateVariant::key).collect()
    }

    /// URL of the variant with this bitrate key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.bitrates
            .iter()
            .find(|v| v.key() == key)
            .map(|v| v.url.as_str())
    }

    pub fn is_playable(&self) -> bool {
        !self.bitrates.is_empty()
    }

    /// Insert keyed by kbps; a later variant with the same kbps replaces
    /// the earlier one in place.
    fn insert(&mut self, variant: BitrateVariant) {
        match self
            .bitrates
            .iter_mut()
            .find(|v| v.bitrate_kbps == variant.bitrate_kbps)
        {
            Some(existing) => *existing = variant,
            None => self.bitrates.push(variant),
        }
    }
}

/// Resolves airings into playable variant URLs.
pub struct StreamResolver {
    session: Arc<Session>,
    endpoints: Endpoints,
}

impl StreamResolver {
    pub fn new(session: Arc<Session>, endpoints: Endpoints) -> Self {
        Self { session, endpoints }
    }

    /// Fetch a fresh pkan token for `airing_id`.
    ///
    /// # Errors
    ///
    /// [`Error::UnexpectedResponse`] if the service answers with an empty
    /// body.
    #[instrument(skip(self))]
    pub fn get_pkan(&self, airing_id: &str) -> Result<String> {
        let response = self
            .session
            .request(Request::get(self.endpoints.pkan()).param("airingId", airing_id))?;
        let pkan = response.raw.trim();
        if pkan.is_empty() {
            return Err(Error::unexpected("dgetpkan", "empty pkan"));
        }
        Ok(pkan.to_string())
    }

    /// Resolve `airing_id` on `channel` (default `espn3`).
    #[instrument(skip(self))]
    pub fn get_stream_url(&self, airing_id: &str, channel: Option<&str>) -> Result<StreamResolution> {
        let channel = channel.unwrap_or(DEFAULT_CHANNEL);
        let pkan = self.get_pkan(airing_id)?;

        let request = Request::post(self.endpoints.start_session())
            .form("channel", channel)
            .form("simulcastAiringId", airing_id)
            .form("playbackScenario", PLAYBACK_SCENARIO)
            .form("playerId", PLAYER_ID)
            .form("pkan", pkan)
            .form("pkanType", PKAN_TYPE)
            .form("tokenType", TOKEN_TYPE)
            .form("ttl", SESSION_TTL);
        let response = self.session.request(request)?;

        let mut resolution = StreamResolution::default();

        let Some(item) = response.body.structured().and_then(media_item) else {
            warn!("Unable to locate media item in session response");
            return Ok(resolution);
        };

        let request_host = Url::parse(&self.endpoints.start_session())?
            .host_str()
            .unwrap_or_default()
            .to_string();
        resolution.auth_cookie = response
            .cookie(MEDIA_AUTH_COOKIE)
            .map(|c| MediaAuthCookie::from_set_cookie(c, &request_host));
        if let Some(cookie) = &resolution.auth_cookie {
            debug!(domain = %cookie.domain, path = %cookie.path, "Media auth cookie captured");
        }

        let Some((field, manifest)) = manifest_url(item) else {
            info!("No HLS manifest found");
            return Ok(resolution);
        };
        debug!(field, %manifest, "HLS manifest found");
        resolution.manifest_url = Some(manifest.clone());

        let fetchable = Url::parse(&manifest).is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        if !fetchable {
            warn!(%manifest, "Invalid manifest URL");
            return Ok(resolution);
        }

        self.parse_manifest(&manifest, &mut resolution)?;
        info!(variants = resolution.bitrates.len(), "Stream resolved");
        Ok(resolution)
    }

    fn parse_manifest(&self, manifest_url: &str, resolution: &mut StreamResolution) -> Result<()> {
        let mut request = Request::get(manifest_url);
        if let Some(cookie) = &resolution.auth_cookie {
            request = request.header("Cookie", cookie.to_string());
        }
        let response = self.session.request(request)?;

        let suffix = resolution
            .auth_cookie
            .as_ref()
            .map(MediaAuthCookie::url_suffix)
            .unwrap_or_default();

        for variant in hls::parse_master_playlist(&response.raw) {
            let url = hls::resolve_uri(manifest_url, &variant.uri);
            resolution.insert(BitrateVariant {
                bitrate_kbps: variant.bitrate_kbps(),
                url: format!("{url}{suffix}"),
            });
        }
        Ok(())
    }
}

/// Walk to the media item, taking the first element wherever a level repeats.
fn media_item(root: &Value) -> Option<&Value> {
    MEDIA_ITEM_PATH
        .iter()
        .try_fold(root, |node, key| first(node.get(key)?))
}

fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Null => None,
        other => Some(other),
    }
}

/// First non-empty manifest field of the media item.
fn manifest_url(item: &Value) -> Option<(&'static str, String)> {
    MANIFEST_FIELDS.iter().find_map(|&field| {
        let text = match first(item.get(field)?)? {
            Value::String(s) => s.trim(),
            Value::Object(map) => map.get("#text")?.as_str()?.trim(),
            _ => return None,
        };
        (!text.is_empty()).then(|| (field, text.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cookie() -> MediaAuthCookie {
        MediaAuthCookie {
            name: MEDIA_AUTH_COOKIE.to_string(),
            value: "abc".to_string(),
            path: "/".to_string(),
            domain: "neulion.go.com".to_string(),
        }
    }

    #[test]
    fn test_cookie_rendering() {
        assert_eq!(cookie().to_string(), "_mediaAuth=abc; path=/; domain=neulion.go.com;");
        assert_eq!(
            cookie().url_suffix(),
            "|Cookie=_mediaAuth%3Dabc%3B+path%3D%2F%3B+domain%3Dneulion.go.com%3B"
        );
    }

    #[test]
    fn test_cookie_defaults() {
        let set = SetCookie {
            name: MEDIA_AUTH_COOKIE.to_string(),
            value: "xyz".to_string(),
            domain: None,
            path: None,
        };
        let captured = MediaAuthCookie::from_set_cookie(&set, "neulion.go.com");
        assert_eq!(captured.path, "/");
        assert_eq!(captured.domain, "neulion.go.com");
    }

    #[test]
    fn test_manifest_fallback_order() {
        let item = json!({"url": null, "hls-backup-url": "http://b/master.m3u8", "alt-url": "http://c"});
        assert_eq!(manifest_url(&item), Some(("hls-backup-url", "http://b/master.m3u8".to_string())));

        let item = json!({"url": "  ", "hls-backup-url": null, "alt-url": {"@type": "x", "#text": "http://c"}});
        assert_eq!(manifest_url(&item), Some(("alt-url", "http://c".to_string())));

        assert_eq!(manifest_url(&json!({"url": null})), None);
    }

    #[test]
    fn test_media_item_takes_first_repeat() {
        let root = json!({
            "user-verified-media-response": {
                "user-verified-event": {
                    "user-verified-content": [
                        {"user-verified-media-item": {"url": "http://first"}},
                        {"user-verified-media-item": {"url": "http://second"}}
                    ]
                }
            }
        });
        assert_eq!(media_item(&root), Some(&json!({"url": "http://first"})));
        assert_eq!(media_item(&json!({"status": 1})), None);
    }

    #[test]
    fn test_duplicate_kbps_later_wins() {
        let mut resolution = StreamResolution::default();
        resolution.insert(BitrateVariant { bitrate_kbps: 5000, url: "a".into() });
        resolution.insert(BitrateVariant { bitrate_kbps: 1200, url: "b".into() });
        resolution.insert(BitrateVariant { bitrate_kbps: 5000, url: "c".into() });

        assert_eq!(resolution.keys(), vec!["5000", "1200"]);
        assert_eq!(resolution.get("5000"), Some("c"));
        assert_eq!(resolution.get("800"), None);
    }
}
