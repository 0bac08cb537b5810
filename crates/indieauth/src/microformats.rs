//! Minimal microformats2 parser.
//!
//! Covers what client application discovery needs: root `h-*` items, explicit
//! `p-`, `u-`, `dt-` and `e-` properties, nested items, and the implied `name`,
//! `photo` and `url` rules. Value-class patterns and backcompat (classic
//! microformats) roots are not supported.
//!
//! See <https://microformats.org/wiki/microformats2-parsing>.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html};
use url::Url;

/// A parsed `h-*` item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// Root class names, e.g. `h-app`.
    pub types: Vec<String>,
    /// Property values keyed by name without prefix.
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
    /// Value of a nested item as seen by its parent property.
    pub value: Option<String>,
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Item(Item),
}

impl PropertyValue {
    /// String form of the value; nested items answer with their `value`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Item(item) => item.value.as_deref(),
        }
    }
}

impl Item {
    /// Whether the item has the given root type.
    #[must_use]
    pub fn has_type(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }

    /// First non-empty string value of `name`.
    #[must_use]
    pub fn first_string(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)?
            .iter()
            .filter_map(PropertyValue::as_str)
            .find(|s| !s.is_empty())
    }

    fn push(&mut self, name: &str, value: PropertyValue) {
        self.properties.entry(name.to_owned()).or_default().push(value);
    }
}

/// Parse all top-level items in `html`, resolving URLs against `base`.
#[must_use]
pub fn parse(html: &str, base: &Url) -> Vec<Item> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();
    find_roots(document.root_element(), base, &mut items);
    items
}

fn find_roots(element: ElementRef<'_>, base: &Url, items: &mut Vec<Item>) {
    if !root_types(element).is_empty() {
        items.push(parse_item(element, base));
        return;
    }
    for child in child_elements(element) {
        find_roots(child, base, items);
    }
}

/// Which kinds of explicit properties were seen while parsing an item.
#[derive(Default)]
struct Seen {
    p: bool,
    u: bool,
    e: bool,
    nested: bool,
}

fn parse_item(element: ElementRef<'_>, base: &Url) -> Item {
    let mut item = Item { types: root_types(element), ..Item::default() };
    let mut seen = Seen::default();

    for child in child_elements(element) {
        collect_properties(child, base, &mut item, &mut seen);
    }

    if !item.properties.contains_key("name") && !seen.p && !seen.e && !seen.nested {
        item.push("name", PropertyValue::Text(implied_name(element)));
    }

    if !item.properties.contains_key("photo") && !seen.u {
        if let Some(photo) = implied_photo(element) {
            item.push("photo", PropertyValue::Text(resolve(base, photo)));
        }
    }

    if !item.properties.contains_key("url") && !seen.u {
        if let Some(url) = implied_url(element) {
            item.push("url", PropertyValue::Text(resolve(base, url)));
        }
    }

    item
}

fn collect_properties(element: ElementRef<'_>, base: &Url, item: &mut Item, seen: &mut Seen) {
    let properties = property_classes(element);

    if !root_types(element).is_empty() {
        let mut nested = parse_item(element, base);
        seen.nested = true;

        // A nested item with no property class is a child, not a property.
        for (prefix, name) in &properties {
            let value = match *prefix {
                "u" => nested.first_string("url").map(str::to_owned),
                _ => nested.first_string("name").map(str::to_owned),
            }
            .unwrap_or_else(|| text_content(element));

            mark(seen, prefix);
            nested.value = Some(value);
            item.push(name, PropertyValue::Item(nested.clone()));
        }
        return;
    }

    for (prefix, name) in &properties {
        mark(seen, prefix);
        let value = match *prefix {
            "u" => resolve(base, &url_value(element)),
            "dt" | "e" => text_content(element),
            _ => text_value(element),
        };
        item.push(name, PropertyValue::Text(value));
    }

    for child in child_elements(element) {
        collect_properties(child, base, item, seen);
    }
}

fn mark(seen: &mut Seen, prefix: &str) {
    match prefix {
        "p" => seen.p = true,
        "u" => seen.u = true,
        "e" => seen.e = true,
        _ => {}
    }
}

fn root_types(element: ElementRef<'_>) -> Vec<String> {
    let mut types: Vec<String> = element
        .value()
        .classes()
        .filter(|c| is_mf2_name(c, "h-"))
        .map(str::to_owned)
        .collect();
    types.sort();
    types.dedup();
    types
}

fn property_classes(element: ElementRef<'_>) -> Vec<(&'static str, String)> {
    let mut properties = Vec::new();
    for class in element.value().classes() {
        for prefix in ["p", "u", "dt", "e"] {
            let marker = format!("{prefix}-");
            if is_mf2_name(class, &marker) {
                properties.push((prefix, class[marker.len()..].to_owned()));
            }
        }
    }
    properties
}

/// `h-card`, `p-name`: a prefix followed by lowercase letters and hyphens.
fn is_mf2_name(class: &str, prefix: &str) -> bool {
    class.strip_prefix(prefix).is_some_and(|rest| {
        !rest.is_empty()
            && rest.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && rest.chars().any(|c| c.is_ascii_lowercase())
    })
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn only_child<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    let mut children = child_elements(element);
    let first = children.next()?;
    if children.next().is_some() || first.value().name() != tag || !root_types(first).is_empty() {
        return None;
    }
    Some(first)
}

fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

fn text_value(element: ElementRef<'_>) -> String {
    let el = element.value();
    let attr = match el.name() {
        "abbr" | "link" => el.attr("title"),
        "data" | "input" => el.attr("value"),
        "img" | "area" => el.attr("alt"),
        _ => None,
    };
    attr.map_or_else(|| text_content(element), str::to_owned)
}

fn url_value(element: ElementRef<'_>) -> String {
    let el = element.value();
    let attr = match el.name() {
        "a" | "area" | "link" => el.attr("href"),
        "img" | "audio" | "source" | "iframe" => el.attr("src"),
        "video" => el.attr("src").or_else(|| el.attr("poster")),
        "object" => el.attr("data"),
        "abbr" => el.attr("title"),
        "data" | "input" => el.attr("value"),
        _ => None,
    };
    attr.map_or_else(|| text_content(element), str::to_owned)
}

fn implied_name(element: ElementRef<'_>) -> String {
    let el = element.value();
    match el.name() {
        "img" | "area" => {
            if let Some(alt) = el.attr("alt") {
                return alt.to_owned();
            }
        }
        "abbr" => {
            if let Some(title) = el.attr("title") {
                return title.to_owned();
            }
        }
        _ => {}
    }

    if let Some(alt) = only_child(element, "img").and_then(|img| img.value().attr("alt")) {
        return alt.to_owned();
    }

    text_content(element)
}

fn implied_photo(element: ElementRef<'_>) -> Option<&str> {
    let el = element.value();
    match el.name() {
        "img" => return el.attr("src"),
        "object" => return el.attr("data"),
        _ => {}
    }

    if let Some(img) = only_child(element, "img") {
        return img.value().attr("src");
    }

    let mut children = child_elements(element);
    let first = children.next()?;
    if children.next().is_some() || !root_types(first).is_empty() {
        return None;
    }
    only_child(first, "img").and_then(|img| img.value().attr("src"))
}

fn implied_url(element: ElementRef<'_>) -> Option<&str> {
    let el = element.value();
    if matches!(el.name(), "a" | "area") {
        return el.attr("href");
    }
    only_child(element, "a").and_then(|a| a.value().attr("href"))
}

fn resolve(base: &Url, value: &str) -> String {
    base.join(value).map_or_else(|_| value.to_owned(), String::from)
}
