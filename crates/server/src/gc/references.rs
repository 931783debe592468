// Asset reference extraction from document text.
//
// Markdown image and link destinations come from the pulldown-cmark event
// stream; raw HTML (`<img src>`, `<video src>`, `<source src>`, `<a href>`,
// `poster`) is scanned with a regex. Only targets under the asset URL prefix
// count. Each is reduced to its asset-relative path: query and fragment
// dropped, percent-decoding applied, absolute URLs cut down to their path.

use std::collections::HashSet;
use std::sync::OnceLock;

use pulldown_cmark::{Event, Options, Parser, Tag};
use regex::Regex;
use url::Url;

fn html_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:src|href|poster)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
            .unwrap_or_else(|e| unreachable!("static regex is valid: {e}"))
    })
}

/// All asset-relative paths (e.g. `2024/01/01/x.png`) cited by `text`.
pub fn extract_references(text: &str, url_prefix: &str) -> HashSet<String> {
    let mut refs = HashSet::new();
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Image { dest_url, .. }) | Event::Start(Tag::Link { dest_url, .. }) => {
                refs.extend(normalize_reference(&dest_url, url_prefix));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                refs.extend(html_references(&html, url_prefix));
            }
            _ => {}
        }
    }

    refs
}

fn html_references<'a>(html: &'a str, url_prefix: &'a str) -> impl Iterator<Item = String> + 'a {
    html_attr_regex().captures_iter(html).filter_map(move |caps| {
        let value = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
        normalize_reference(value.as_str(), url_prefix)
    })
}

/// Reduces a raw link target to an asset-relative path, or `None` when it
/// does not point into the asset tree.
pub fn normalize_reference(raw: &str, url_prefix: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('<').trim_end_matches('>');

    let path = match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url.path().to_string(),
        Ok(_) => return None,
        Err(_) => trimmed.to_string(),
    };

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).map(|d| d.into_owned()).unwrap_or_else(|_| path.to_string());

    // Relative links from nested documents (`../assets/...`) climb out of
    // the document's directory first; the asset tree is the same either way.
    let mut relative = decoded.trim_start_matches('/');
    while let Some(rest) = relative.strip_prefix("../").or_else(|| relative.strip_prefix("./")) {
        relative = rest.trim_start_matches('/');
    }

    let prefix = url_prefix.trim_matches('/');
    let rest = relative.strip_prefix(prefix)?.strip_prefix('/')?;

    let mut parts = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
