//! Link relation extraction from HTTP `Link` headers (RFC 8288) and HTML.

use reqwest::header::{HeaderMap, LINK};
use scraper::{ElementRef, Html};

/// A single `Link` header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub rels: Vec<String>,
}

/// Parse one `Link` header value, which may hold several comma-separated links.
///
/// Malformed entries are skipped.
#[must_use]
pub fn parse_link_header(value: &str) -> Vec<Link> {
    split_outside_quotes(value, ',').into_iter().filter_map(parse_link).collect()
}

fn parse_link(entry: &str) -> Option<Link> {
    let mut parts = split_outside_quotes(entry, ';').into_iter();
    let target = parts.next()?.trim();
    let href = target.strip_prefix('<')?.strip_suffix('>')?.trim().to_owned();

    let mut rels = Vec::new();
    for param in parts {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("rel") && rels.is_empty() {
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            rels = value.split_ascii_whitespace().map(str::to_owned).collect();
        }
    }

    Some(Link { href, rels })
}

/// Split on `sep`, ignoring separators inside `<...>` or double quotes.
fn split_outside_quotes(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '"' if !in_angle => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            c if c == sep && !in_quotes && !in_angle => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// First href for each of `rels` among the response's `Link` headers.
#[must_use]
pub fn header_links(headers: &HeaderMap, rels: &[&str]) -> Vec<Option<String>> {
    let links: Vec<Link> = headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_link_header)
        .collect();

    rels.iter()
        .map(|rel| links.iter().find(|l| l.rels.iter().any(|r| r == rel)).map(|l| l.href.clone()))
        .collect()
}

/// First href for each of `rels` in an HTML document.
///
/// `<link>` elements are searched first, then `<a>` elements, each in document
/// order.
#[must_use]
pub fn html_links(body: &str, rels: &[&str]) -> Vec<Option<String>> {
    let document = Html::parse_document(body);
    let candidates: Vec<(&str, &str, &str)> = document
        .tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let el = el.value();
            Some((el.name(), el.attr("rel")?, el.attr("href")?))
        })
        .filter(|(name, _, _)| matches!(*name, "link" | "a"))
        .collect();

    rels.iter()
        .map(|rel| {
            ["link", "a"].iter().find_map(|tag| {
                candidates
                    .iter()
                    .filter(|(name, _, _)| name == tag)
                    .find(|(_, rel_attr, _)| rel_attr.split_ascii_whitespace().any(|r| r == *rel))
                    .map(|(_, _, href)| (*href).to_owned())
            })
        })
        .collect()
}
