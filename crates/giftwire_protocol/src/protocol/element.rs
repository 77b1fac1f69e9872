//! Attribute decoding for self-closing response elements.
//!
//! Responses are scanned, not parsed: anything that does not look like a
//! complete tag is skipped, so a truncated frame simply yields fewer
//! elements.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// Matches a complete self-closing element: `<NAME attrs/>`.
fn self_closing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<([A-Za-z_][\w.-]*)(\s[^<>]*?)?\s*/>").expect("self-closing element pattern")
    })
}

/// Matches any opening or self-closing tag: `<NAME attrs>` / `<NAME attrs/>`.
fn any_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<([A-Za-z_][\w.-]*)(\s[^<>]*?)?\s*/?>").expect("tag pattern")
    })
}

/// Matches one `key="value"` pair.
fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*"([^"]*)""#).expect("attribute pattern")
    })
}

/// A decoded element: tag name plus attributes in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Tag name.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
}

impl Element {
    /// Decodes an element from its tag name and raw attribute text.
    #[must_use]
    pub fn from_parts(name: &str, raw_attributes: &str) -> Self {
        let attributes = attribute_pattern()
            .captures_iter(raw_attributes)
            .map(|caps| (caps[1].to_string(), unescape_attr(&caps[2]).into_owned()))
            .collect();

        Self {
            name: name.to_string(),
            attributes,
        }
    }

    /// Looks up an attribute by exact key. First occurrence wins.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Looks up and parses an attribute. Unparseable values read as absent.
    #[must_use]
    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Option<T> {
        self.attr(key).and_then(|v| v.trim().parse().ok())
    }
}

/// Extracts every complete self-closing element from a response.
pub fn elements(text: &str) -> impl Iterator<Item = Element> + '_ {
    self_closing_pattern().captures_iter(text).map(|caps| {
        let raw = caps.get(2).map_or("", |m| m.as_str());
        Element::from_parts(&caps[1], raw)
    })
}

/// Extracts every self-closing element with the given tag name.
#[must_use]
pub fn elements_named(text: &str, name: &str) -> Vec<Element> {
    elements(text).filter(|e| e.name == name).collect()
}

/// Returns the first `code` attribute carried by any tag in the response.
#[must_use]
pub fn status_code(text: &str) -> Option<u32> {
    any_tag_pattern().captures_iter(text).find_map(|caps| {
        let raw = caps.get(2).map_or("", |m| m.as_str());
        Element::from_parts(&caps[1], raw).parse_attr("code")
    })
}

/// Reverses [`escape_attr`](super::escape_attr).
#[must_use]
pub fn unescape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    Cow::Owned(
        value
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_element_attributes() {
        let found: Vec<_> = elements(r#"<O id="x" txt="y" section="2" count="5"/>"#).collect();
        assert_eq!(found.len(), 1);
        let item = &found[0];
        assert_eq!(item.name, "O");
        assert_eq!(item.attr("id"), Some("x"));
        assert_eq!(item.attr("txt"), Some("y"));
        assert_eq!(item.parse_attr::<u8>("section"), Some(2));
        assert_eq!(item.parse_attr::<u32>("count"), Some(5));
    }

    #[test]
    fn test_max_count_is_not_count() {
        let item = elements(r#"<O id="1" max_count="99" txt="Ammo"/>"#)
            .next()
            .unwrap();
        assert_eq!(item.attr("count"), None);
        assert_eq!(item.parse_attr::<u32>("max_count"), Some(99));
    }

    #[test]
    fn test_count_after_max_count() {
        let item = elements(r#"<O max_count="99" count="3" id="1"/>"#).next().unwrap();
        assert_eq!(item.parse_attr::<u32>("count"), Some(3));
    }

    #[test]
    fn test_space_before_close() {
        let found = elements_named(r#"<GIFT><O id="1" txt="a" /><O id="2" txt="b"/></GIFT>"#, "O");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].attr("txt"), Some("b"));
    }

    #[test]
    fn test_truncated_element_is_skipped() {
        let found = elements_named(r#"<O id="1" txt="a"/><O id="2" txt="tru"#, "O");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_open_tags_are_not_elements() {
        let found: Vec<_> = elements(r#"<MYPARAM login="x"><O id="1"/></MYPARAM>"#).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "O");
    }

    #[test]
    fn test_elements_across_nul_separated_frames() {
        let text = "<OK />\0<O id=\"1\" txt=\"a\"/>\0<O id=\"2\" txt=\"b\"/>";
        assert_eq!(elements_named(text, "O").len(), 2);
    }

    #[test]
    fn test_unescape_values() {
        let item = elements(r#"<O txt="Tom &amp; Jerry &quot;box&quot;"/>"#).next().unwrap();
        assert_eq!(item.attr("txt"), Some("Tom & Jerry \"box\""));
    }

    #[test]
    fn test_status_code_on_open_tag() {
        assert_eq!(status_code(r#"<GH code="0">done</GH>"#), Some(0));
        assert_eq!(status_code(r#"<GH code="17"/>"#), Some(17));
        assert_eq!(status_code("<GH/>"), None);
        assert_eq!(status_code(""), None);
    }
}
