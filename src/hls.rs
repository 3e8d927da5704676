//! HLS master playlist parsing.
//!
//! Only what stream resolution needs: the `#EXT-X-STREAM-INF` variants of a
//! master playlist, their declared bandwidth, and their URIs resolved
//! against the manifest URL.

use std::collections::HashMap;

use tracing::debug;
use url::Url;

/// One variant stream of a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsVariant {
    /// Declared `BANDWIDTH` in bits per second.
    pub bandwidth: u64,
    /// `RESOLUTION`, e.g. `1280x720`.
    pub resolution: Option<String>,
    pub codecs: Option<String>,
    /// URI as written in the playlist.
    pub uri: String,
}

impl HlsVariant {
    /// Bandwidth in kbps, truncated.
    pub fn bitrate_kbps(&self) -> u64 {
        self.bandwidth / 1000
    }
}

/// Parse the variants of a master playlist, in playlist order.
///
/// Variants without a `BANDWIDTH` attribute or without a URI line are
/// skipped.
pub fn parse_master_playlist(content: &str) -> Vec<HlsVariant> {
    let mut variants = Vec::new();
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());

    while let Some(line) = lines.next() {
        let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };
        let attrs = parse_attributes(rest);

        let Some(uri_line) = lines.next() else {
            break;
        };
        if uri_line.starts_with('#') {
            debug!("Variant without URI: {line}");
            continue;
        }

        let Some(bandwidth) = attrs.get("BANDWIDTH").and_then(|v| v.parse().ok()) else {
            debug!("Variant without BANDWIDTH: {line}");
            continue;
        };

        variants.push(HlsVariant {
            bandwidth,
            resolution: attrs.get("RESOLUTION").cloned(),
            codecs: attrs.get("CODECS").cloned(),
            uri: uri_line.to_string(),
        });
    }

    variants
}

/// Parse an HLS attribute list (`KEY=value,KEY="quoted,value"`).
pub fn parse_attributes(attr_str: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut chars = attr_str.chars().peekable();

    while chars.peek().is_some() {
        let key: String = chars.by_ref().take_while(|&c| c != '=').collect();

        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next(); // opening quote
            let v: String = chars.by_ref().take_while(|&c| c != '"').collect();
            chars.next(); // trailing comma, if any
            v
        } else {
            chars.by_ref().take_while(|&c| c != ',').collect()
        };

        attrs.insert(key.trim().to_string(), value.trim().to_string());
    }

    attrs
}

/// Resolve a variant URI against the manifest URL.
///
/// - `http…` URIs are used as-is
/// - root-relative URIs (`/path`) are joined to the manifest origin
/// - anything else is appended to the manifest's directory prefix: the URL
///   (query stripped) up to and including its last `/`
pub fn resolve_uri(manifest_url: &str, uri: &str) -> String {
    if uri.starts_with("http") {
        return uri.to_string();
    }

    if uri.starts_with('/') {
        if let Ok(joined) = Url::parse(manifest_url).and_then(|base| base.join(uri)) {
            return joined.to_string();
        }
    }

    format!("{}{uri}", directory_prefix(manifest_url))
}

fn directory_prefix(manifest_url: &str) -> &str {
    let without_query = manifest_url
        .split_once('?')
        .map_or(manifest_url, |(path, _)| path);
    without_query
        .rfind('/')
        .map_or("", |idx| &without_query[..=idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=5000000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"
5000/index.m3u8
#EXT-X-STREAM-INF:PROGRAM-ID=1,BANDWIDTH=1200000
http://cdn2.example.com/1200/index.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=90000,URI=\"iframe.m3u8\"
#EXT-X-STREAM-INF:PROGRAM-ID=1,RESOLUTION=320x180
nobandwidth.m3u8
";

    #[test]
    fn test_parse_master_playlist() {
        let variants = parse_master_playlist(MASTER);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].bandwidth, 5_000_000);
        assert_eq!(variants[0].bitrate_kbps(), 5000);
        assert_eq!(variants[0].resolution.as_deref(), Some("1280x720"));
        assert_eq!(variants[0].codecs.as_deref(), Some("avc1.4d401f,mp4a.40.2"));
        assert_eq!(variants[1].uri, "http://cdn2.example.com/1200/index.m3u8");
    }

    #[test]
    fn test_kbps_truncates() {
        let variant = HlsVariant {
            bandwidth: 1_499_999,
            resolution: None,
            codecs: None,
            uri: String::new(),
        };
        assert_eq!(variant.bitrate_kbps(), 1499);
    }

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes("BANDWIDTH=1280000,RESOLUTION=720x480");
        assert_eq!(attrs.get("BANDWIDTH"), Some(&"1280000".to_string()));
        assert_eq!(attrs.get("RESOLUTION"), Some(&"720x480".to_string()));

        let attrs2 = parse_attributes("CODECS=\"avc1.4d401f,mp4a.40.2\",BANDWIDTH=2000000");
        assert_eq!(attrs2.get("CODECS"), Some(&"avc1.4d401f,mp4a.40.2".to_string()));
        assert_eq!(attrs2.get("BANDWIDTH"), Some(&"2000000".to_string()));
    }

    #[test]
    fn test_resolve_uri() {
        let manifest = "http://cdn.example.com/live/espn3/master.m3u8?token=abc";
        assert_eq!(
            resolve_uri(manifest, "5000/index.m3u8"),
            "http://cdn.example.com/live/espn3/5000/index.m3u8"
        );
        assert_eq!(
            resolve_uri(manifest, "/other/index.m3u8"),
            "http://cdn.example.com/other/index.m3u8"
        );
        assert_eq!(
            resolve_uri(manifest, "https://cdn2.example.com/x.m3u8"),
            "https://cdn2.example.com/x.m3u8"
        );
    }
}
