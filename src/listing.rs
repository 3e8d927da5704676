//! Display-ready records handed to the host UI.

use chrono::Local;

use crate::catalog::{Category, Channel, Event};

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub title: String,
    /// Selecting the item starts playback instead of opening a folder.
    pub playable: bool,
    /// Thumbnail URL.
    pub art: Option<String>,
    /// Navigation parameters, in insertion order.
    pub params: Vec<(String, String)>,
}

impl ListItem {
    fn new(title: impl Into<String>, params: &[(&str, &str)]) -> Self {
        Self {
            title: title.into(),
            playable: false,
            art: None,
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// `?key=value&…`, form-encoded.
    pub fn query(&self) -> String {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        format!("?{encoded}")
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl From<&Category> for ListItem {
    fn from(category: &Category) -> Self {
        Self::new(
            &category.name,
            &[("action", "schedule"), ("service", category.id.as_str())],
        )
    }
}

impl From<&Channel> for ListItem {
    fn from(channel: &Channel) -> Self {
        Self::new(&channel.name, &[("action", "channel"), ("channel", channel.id.as_str())])
    }
}

impl From<&Event> for ListItem {
    /// Label is prefixed with the local start time when known.
    fn from(event: &Event) -> Self {
        let title = match event.start_time {
            Some(start) => format!(
                "{} {}",
                start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                event.name
            ),
            None => event.name.clone(),
        };
        let mut item = Self::new(title, &[("action", "play"), ("airing_id", event.airing_id.as_str())]);
        item.playable = true;
        item.art.clone_from(&event.image_url);
        item
    }
}

/// A resolved stream ready for the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableItem {
    /// Variant URL without the inline header part.
    pub url: String,
    /// Inline header parameter (`Cookie=…`), when the stream needs one.
    pub headers: Option<String>,
}

impl PlayableItem {
    /// Split a `url|Cookie=…` playback URL.
    pub fn from_playback_url(playback_url: &str) -> Self {
        match playback_url.split_once('|') {
            Some((url, headers)) => Self {
                url: url.to_string(),
                headers: Some(headers.to_string()),
            },
            None => Self {
                url: playback_url.to_string(),
                headers: None,
            },
        }
    }

    /// The playback URL with headers re-attached.
    pub fn playback_url(&self) -> String {
        match &self.headers {
            Some(headers) => format!("{}|{headers}", self.url),
            None => self.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_navigates_to_schedule() {
        let category = Category {
            name: "College Football".to_string(),
            id: "ncf".to_string(),
        };
        let item = ListItem::from(&category);
        assert_eq!(item.query(), "?action=schedule&service=ncf");
        assert!(!item.playable);
    }

    #[test]
    fn event_is_playable_with_time_prefix() {
        let event: Event = serde_json::from_value(json!({
            "name": "Duke vs UNC",
            "status": "inplay",
            "start_time": "2016-03-05T19:30:00.000",
            "image_url": "http://img/1.jpg",
            "airing_id": "4242",
        }))
        .unwrap();
        let item = ListItem::from(&event);

        assert!(item.playable);
        assert!(item.title.ends_with(" Duke vs UNC"));
        assert!(item.title.starts_with("2016-03-0"));
        assert_eq!(item.param("airing_id"), Some("4242"));
        assert_eq!(item.art.as_deref(), Some("http://img/1.jpg"));
    }

    #[test]
    fn channel_query_is_encoded() {
        let channel = Channel {
            name: "ESPN 3".to_string(),
            id: "espn 3".to_string(),
        };
        let item = ListItem::from(&channel);
        assert_eq!(item.query(), "?action=channel&channel=espn+3");
        assert!(!item.playable);
    }

    #[test]
    fn playable_item_splits_headers() {
        let item = PlayableItem::from_playback_url("http://cdn/5000.m3u8|Cookie=_mediaAuth%3Dabc");
        assert_eq!(item.url, "http://cdn/5000.m3u8");
        assert_eq!(item.headers.as_deref(), Some("Cookie=_mediaAuth%3Dabc"));
        assert_eq!(item.playback_url(), "http://cdn/5000.m3u8|Cookie=_mediaAuth%3Dabc");

        let bare = PlayableItem::from_playback_url("http://cdn/5000.m3u8");
        assert!(bare.headers.is_none());
    }
}
