use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Attributes of one HTML start tag, keyed by lower-cased attribute name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub attributes: HashMap<String, String>,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|value| value.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

static ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("ATTRIBUTE_REGEX should compile")
});

/// Every start tag named `name` in document order
pub fn find_tags(html: &str, name: &str) -> Vec<Tag> {
    let pattern = format!(r#"(?is)<{}\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#, regex::escape(name));
    let Ok(tag_regex) = Regex::new(&pattern) else {
        return Vec::new();
    };

    tag_regex
        .captures_iter(html)
        .map(|caps| parse_attributes(caps.get(1).map_or("", |m| m.as_str())))
        .collect()
}

pub fn parse_attributes(raw: &str) -> Tag {
    let attributes = ATTRIBUTE_REGEX
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value)))
        })
        .collect();

    Tag { attributes }
}

pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
