//! `<meta>` description extraction.
//!
//! Regex-based on purpose: pages are third-party and often malformed, and
//! only three tags matter. Attribute order inside the tag does not matter.

use std::sync::OnceLock;

use regex::Regex;

/// Tags consulted, in priority order.
const DESCRIPTION_KEYS: [&str; 3] = ["description", "og:description", "twitter:description"];

fn meta_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap_or_else(|e| panic!("invalid meta regex: {e}")))
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .unwrap_or_else(|e| panic!("invalid attribute regex: {e}"))
    })
}

/// First non-empty description found in `html`.
pub fn extract_description(html: &str) -> Option<String> {
    let mut found: [Option<String>; 3] = Default::default();

    for tag in meta_tag_regex().find_iter(html) {
        let mut key = None;
        let mut content = None;
        for attr in attribute_regex().captures_iter(tag.as_str()) {
            let name = attr[1].to_ascii_lowercase();
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str()).unwrap_or_default();
            match name.as_str() {
                "name" | "property" => key = Some(value.trim().to_ascii_lowercase()),
                "content" => content = Some(value),
                _ => {}
            }
        }

        let (Some(key), Some(content)) = (key, content) else {
            continue;
        };
        let Some(slot) = DESCRIPTION_KEYS.iter().position(|k| *k == key) else {
            continue;
        };
        let text = decode_entities(content.trim());
        if found[slot].is_none() && !text.is_empty() {
            found[slot] = Some(text);
        }
    }

    found.into_iter().flatten().next()
}

/// Decode the handful of entities that show up in descriptions.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
