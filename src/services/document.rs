//! Queryable view over a rendered page.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};

/// Elements whose text never belongs to post content.
const NON_CONTENT_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// A parsed HTML document exposing first-match and all-matches queries.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full HTML document.
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// First element matching the selector.
    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    /// Every element matching the selector, in document order.
    pub fn select_all<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(selector)
    }

    /// Whitespace-normalized text of an element.
    pub fn text(element: ElementRef<'_>) -> String {
        normalize_whitespace(&element.text().collect::<String>())
    }

    /// Attribute value, if present.
    pub fn attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
        element.value().attr(name)
    }

    /// Text content with script/style subtrees removed, one stripped text
    /// run per line.
    pub fn content_text(element: ElementRef<'_>) -> String {
        let mut lines = Vec::new();
        collect_content(element, &mut lines);
        lines.join("\n")
    }
}

fn collect_content(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !NON_CONTENT_TAGS.contains(&child_element.value().name()) {
                collect_content(child_element, lines);
            }
        }
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a CSS selector, mapping failures to `AppError::Selector`.
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector_valid() {
        assert!(parse_selector("div.se-main-container").is_ok());
        assert!(parse_selector("img[src*='cdn']").is_ok());
    }

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
    }

    #[test]
    fn test_content_text_skips_scripts() {
        let doc = Document::parse(
            r#"<div id="c"><p> Hello   world </p><script>var x = 1;</script>
               <style>.a{}</style><p>Second line</p></div>"#,
        );
        let sel = parse_selector("#c").unwrap();
        let el = doc.select_first(&sel).unwrap();
        assert_eq!(Document::content_text(el), "Hello   world\nSecond line");
    }

    #[test]
    fn test_text_and_attr() {
        let doc = Document::parse(r#"<a class="t" href="/x">  Some
            title </a><a class="t">Other</a>"#);
        let sel = parse_selector("a.t").unwrap();
        let first = doc.select_first(&sel).unwrap();
        assert_eq!(Document::text(first), "Some title");
        assert_eq!(Document::attr(first, "href"), Some("/x"));
        assert_eq!(doc.select_all(&sel).count(), 2);
    }
}
