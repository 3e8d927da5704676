//! Response body decoding.
//!
//! The backends answer in JSON, XML or plain text depending on the endpoint.
//! Bodies are decoded once into a tagged [`ResponseBody`] and callers match
//! on the kind. XML is mapped into the same [`Value`] tree as JSON:
//!
//! - element with children or attributes → object keyed by child name
//! - repeated child → array
//! - text-only element → string, empty element → `null`
//! - attribute → `@name` key, text next to children → `#text`

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

/// Which decoder produced a [`ResponseBody`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Text,
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Xml(Value),
    Text(String),
}

impl ResponseBody {
    /// Decode `text` according to the declared content type, sniffing the
    /// first character when the type says nothing. A decoder failure falls
    /// back to [`ResponseBody::Text`].
    pub fn decode(content_type: Option<&str>, text: &str) -> Self {
        let declared = content_type.unwrap_or_default().to_ascii_lowercase();
        let trimmed = text.trim_start();

        let kind = if declared.contains("json") {
            ContentKind::Json
        } else if declared.contains("xml") {
            ContentKind::Xml
        } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
            ContentKind::Json
        } else if trimmed.starts_with('<') {
            ContentKind::Xml
        } else {
            ContentKind::Text
        };

        match kind {
            ContentKind::Json => serde_json::from_str(text)
                .map_or_else(|_| Self::Text(text.to_string()), Self::Json),
            ContentKind::Xml => {
                xml_to_value(text).map_or_else(|| Self::Text(text.to_string()), Self::Xml)
            }
            ContentKind::Text => Self::Text(text.to_string()),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Json(_) => ContentKind::Json,
            Self::Xml(_) => ContentKind::Xml,
            Self::Text(_) => ContentKind::Text,
        }
    }

    /// The structured tree for JSON and XML bodies.
    pub fn structured(&self) -> Option<&Value> {
        match self {
            Self::Json(v) | Self::Xml(v) => Some(v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
}

struct Frame {
    name: String,
    attrs: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String, attrs: Map<String, Value>) -> Self {
        Self {
            name,
            attrs,
            children: Map::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> (String, Value) {
        let text = self.text.trim();
        if self.attrs.is_empty() && self.children.is_empty() {
            let value = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            };
            return (self.name, value);
        }

        let mut object = self.attrs;
        object.extend(self.children);
        if !text.is_empty() {
            object.insert("#text".to_string(), Value::String(text.to_string()));
        }
        (self.name, Value::Object(object))
    }
}

fn insert_child(children: &mut Map<String, Value>, name: String, value: Value) {
    match children.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            children.insert(name, value);
        }
    }
}

/// Convert an XML document into a [`Value`] tree rooted at
/// `{root_name: ...}`. Returns `None` for malformed or empty documents.
pub fn xml_to_value(xml: &str) -> Option<Value> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                stack.push(Frame::new(name, attributes(&e)));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let frame = Frame::new(name, attributes(&e));
                close(frame, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                let frame = stack.pop()?;
                close(frame, &mut stack, &mut root);
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&decode_entities(&String::from_utf8_lossy(&e)));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some(top) = stack.last_mut() {
                    let name = String::from_utf8_lossy(&e);
                    match resolve_entity(&name) {
                        Some(c) => top.text.push(c),
                        None => {
                            top.text.push('&');
                            top.text.push_str(&name);
                            top.text.push(';');
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
    }

    if !stack.is_empty() {
        return None;
    }
    root
}

fn close(frame: Frame, stack: &mut [Frame], root: &mut Option<Value>) {
    let (name, value) = frame.into_value();
    match stack.last_mut() {
        Some(parent) => insert_child(&mut parent.children, name, value),
        None => {
            let mut object = Map::new();
            object.insert(name, value);
            *root = Some(Value::Object(object));
        }
    }
}

fn attributes(e: &quick_xml::events::BytesStart<'_>) -> Map<String, Value> {
    let mut attrs = Map::new();
    for attr in e.attributes().flatten() {
        let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
        let value = decode_entities(&String::from_utf8_lossy(&attr.value));
        attrs.insert(key, Value::String(value));
    }
    attrs
}

/// Resolve a predefined or numeric character entity (without `&`/`;`).
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let number = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(number)
        }
    }
}

fn decode_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find(';').and_then(|end| resolve_entity(&tail[..end]).map(|c| (c, end))) {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_json_is_parsed() {
        let body = ResponseBody::decode(Some("application/json;charset=UTF-8"), r#"{"code":"loginsuccess"}"#);
        assert_eq!(body.kind(), ContentKind::Json);
        assert_eq!(body.structured(), Some(&json!({"code": "loginsuccess"})));
    }

    #[test]
    fn sniffing_without_content_type() {
        assert_eq!(ResponseBody::decode(None, "[1,2]").kind(), ContentKind::Json);
        assert_eq!(ResponseBody::decode(None, "<a>1</a>").kind(), ContentKind::Xml);
        assert_eq!(ResponseBody::decode(None, "PKAN123").kind(), ContentKind::Text);
    }

    #[test]
    fn broken_json_falls_back_to_text() {
        let body = ResponseBody::decode(Some("application/json"), "{not json");
        assert_eq!(body.as_text(), Some("{not json"));
    }

    #[test]
    fn m3u8_stays_text() {
        let body = ResponseBody::decode(Some("application/vnd.apple.mpegurl"), "#EXTM3U\n");
        assert_eq!(body.kind(), ContentKind::Text);
    }

    #[test]
    fn xml_maps_like_xmltodict() {
        let xml = r#"<?xml version="1.0"?>
<user-verified-media-response>
  <status-code>1</status-code>
  <user-verified-event>
    <user-verified-content type="video">
      <user-verified-media-item>
        <url>http://cdn.example.com/a/master.m3u8?x=1&amp;y=2</url>
        <hls-backup-url></hls-backup-url>
        <alt-url/>
      </user-verified-media-item>
    </user-verified-content>
  </user-verified-event>
</user-verified-media-response>"#;

        let value = xml_to_value(xml).unwrap();
        let content = &value["user-verified-media-response"]["user-verified-event"]["user-verified-content"];
        assert_eq!(content["@type"], json!("video"));
        let item = &content["user-verified-media-item"];
        assert_eq!(item["url"], json!("http://cdn.example.com/a/master.m3u8?x=1&y=2"));
        assert_eq!(item["hls-backup-url"], Value::Null);
        assert_eq!(item["alt-url"], Value::Null);
        assert_eq!(value["user-verified-media-response"]["status-code"], json!("1"));
    }

    #[test]
    fn repeated_children_become_arrays() {
        let value = xml_to_value("<channels><channel>a</channel><channel>b</channel></channels>").unwrap();
        assert_eq!(value, json!({"channels": {"channel": ["a", "b"]}}));
    }

    #[test]
    fn malformed_xml_is_none() {
        assert!(xml_to_value("<a><b></a>").is_none());
        assert!(xml_to_value("").is_none());
    }

    #[test]
    fn entities_in_attributes() {
        assert_eq!(decode_entities("a&amp;b&#65;&#x42;&bogus"), "a&bAB&bogus");
    }
}
