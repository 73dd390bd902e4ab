//! Post content extraction.
//!
//! Every field has an ordered chain of candidate selectors, one per editor
//! generation of the platform's markup. Only one generation is ever present
//! in a page, so the first candidate that yields usable content wins and the
//! order encodes priority. A field with no match falls back to a placeholder;
//! extraction itself never fails.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use scraper::{ElementRef, Selector};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::error::Result;
use crate::models::{ExtractionConfig, ImageRef, PostRecord, SiteConfig, UrlDescriptor};
use crate::services::document::{Document, normalize_whitespace, parse_selector};
use crate::utils::resolve_url;

const TITLE_SELECTORS: &[&str] = &[
    ".se-title-text",     // editor v3
    "div.se_title",       // editor v2
    ".pcol1 .title_area", // legacy
    ".tit_area .tit",
    "h3.se-title",
    "h1",
];

const AUTHOR_SELECTORS: &[&str] = &[
    ".blog_author",
    ".nick_area .nick",
    ".se-author-text",
    ".nick",
    ".writer",
    ".author",
];

const DATE_SELECTORS: &[&str] = &[".se_publishDate", ".blog_date", ".se-date", ".date"];

const BODY_SELECTORS: &[&str] = &[
    "div.se-main-container", // editor v3
    "div.se_component_wrap", // editor v2
    "div#postViewArea",      // legacy
    "div.post-view",
    "article",
    ".blog_content",
];

const IMAGE_SELECTORS: &[&str] = &[
    "img.se-image-resource",
    "img.se_img",
    "div#postViewArea img",
    "img",
];

const TAG_SELECTORS: &[&str] = &[
    ".tag_area a",
    ".post_tag a",
    ".se-module-text .tag",
    ".blog_tag a",
    "[data-tag]",
];

/// Lazy-loading pages park the real source in these attributes.
const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];

pub const TITLE_PLACEHOLDER: &str = "title unavailable";
pub const BODY_PLACEHOLDER: &str = "content unavailable";

/// Ordered candidate selectors for one field.
#[derive(Debug)]
struct FieldChain {
    field: &'static str,
    candidates: Vec<(&'static str, Selector)>,
}

impl FieldChain {
    fn new(field: &'static str, sources: &[&'static str]) -> Result<Self> {
        let candidates = sources
            .iter()
            .map(|source| parse_selector(source).map(|sel| (*source, sel)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { field, candidates })
    }

    /// Apply `extract` to the first match of each candidate in order and
    /// return the first value accepted.
    fn first_match<T>(
        &self,
        doc: &Document,
        extract: impl Fn(ElementRef<'_>) -> T,
        accept: impl Fn(&T) -> bool,
    ) -> Option<T> {
        self.candidates.iter().find_map(|(source, selector)| {
            let value = extract(doc.select_first(selector)?);
            if accept(&value) {
                log::debug!("{} matched '{}'", self.field, source);
                Some(value)
            } else {
                None
            }
        })
    }

    /// Like `first_match`, but each candidate sees all of its matches.
    fn first_nonempty<T>(
        &self,
        doc: &Document,
        extract: impl Fn(&mut dyn Iterator<Item = ElementRef<'_>>) -> Vec<T>,
    ) -> Vec<T> {
        for (source, selector) in &self.candidates {
            let values = extract(&mut doc.select_all(selector));
            if !values.is_empty() {
                log::debug!("{} matched '{}' ({} item(s))", self.field, source, values.len());
                return values;
            }
        }
        Vec::new()
    }
}

/// Extracts structured post records from rendered documents.
#[derive(Debug)]
pub struct ContentExtractor {
    title: FieldChain,
    author: FieldChain,
    date: FieldChain,
    body: FieldChain,
    images: FieldChain,
    tags: FieldChain,
    limits: ExtractionConfig,
    origin: Url,
}

impl ContentExtractor {
    /// Build an extractor with the platform's selector chains.
    pub fn new(site: &SiteConfig, limits: ExtractionConfig) -> Result<Self> {
        let origin = Url::parse(&site.canonical_origin)?;

        Ok(Self {
            title: FieldChain::new("title", TITLE_SELECTORS)?,
            author: FieldChain::new("author", AUTHOR_SELECTORS)?,
            date: FieldChain::new("date", DATE_SELECTORS)?,
            body: FieldChain::new("body", BODY_SELECTORS)?,
            images: FieldChain::new("images", IMAGE_SELECTORS)?,
            tags: FieldChain::new("tags", TAG_SELECTORS)?,
            limits,
            origin,
        })
    }

    /// Extract every field of a post. Missing fields degrade to placeholders.
    pub fn extract(
        &self,
        doc: &Document,
        descriptor: &UrlDescriptor,
        source_url: &str,
    ) -> PostRecord {
        let post_ref = format!("{}/{}", descriptor.site_id, descriptor.post_id);
        let non_empty = |s: &String| !s.is_empty();

        let title = self
            .title
            .first_match(doc, Document::text, non_empty)
            .unwrap_or_else(|| {
                log::debug!("No title found for {post_ref}, using placeholder");
                TITLE_PLACEHOLDER.to_string()
            });

        let author = self
            .author
            .first_match(doc, Document::text, non_empty)
            .unwrap_or_else(|| {
                log::debug!("No author found for {post_ref}, using blog id");
                descriptor.site_id.clone()
            });

        let date = self
            .date
            .first_match(doc, Document::text, non_empty)
            .unwrap_or_default();

        let min_body = self.limits.min_body_chars;
        let body = self
            .body
            .first_match(doc, Document::content_text, |text: &String| {
                text.chars().count() > min_body
            })
            .map(|text| self.truncate_body(text))
            .unwrap_or_else(|| {
                log::debug!("No body found for {post_ref}, using placeholder");
                BODY_PLACEHOLDER.to_string()
            });

        PostRecord {
            title,
            author,
            date,
            body,
            images: self.extract_images(doc),
            tags: self.extract_tags(doc),
            site_id: descriptor.site_id.clone(),
            post_id: descriptor.post_id.clone(),
            source_url: source_url.to_string(),
            scraped_at: Utc::now(),
            error: None,
        }
    }

    fn extract_images(&self, doc: &Document) -> Vec<ImageRef> {
        self.images.first_nonempty(doc, |elements| {
            let mut seen = HashSet::new();
            let mut images = Vec::new();
            for img in elements {
                let Some(url) = image_source(img).and_then(|src| self.resolve_image_url(src))
                else {
                    continue;
                };
                if !seen.insert(url.clone()) {
                    continue;
                }
                images.push(ImageRef {
                    url,
                    alt: Document::attr(img, "alt").unwrap_or_default().to_string(),
                    title: Document::attr(img, "title").unwrap_or_default().to_string(),
                    width: Document::attr(img, "width").and_then(|w| w.trim().parse().ok()),
                    height: Document::attr(img, "height").and_then(|h| h.trim().parse().ok()),
                });
            }
            images
        })
    }

    fn extract_tags(&self, doc: &Document) -> BTreeSet<String> {
        self.tags
            .first_nonempty(doc, |elements| {
                elements
                    .filter_map(|el| {
                        let mut text = Document::text(el);
                        if text.is_empty() {
                            text = normalize_whitespace(Document::attr(el, "data-tag")?);
                        }
                        let tag = text.trim_start_matches('#').trim().to_string();
                        (!tag.is_empty()).then_some(tag)
                    })
                    .collect::<Vec<String>>()
            })
            .into_iter()
            .collect()
    }

    /// Make an image source absolute, or drop it if it is inline data,
    /// a decorative GIF or an unresolvable relative path.
    pub fn resolve_image_url(&self, src: &str) -> Option<String> {
        let src = src.trim();
        if src.is_empty() || src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            return None;
        }

        let absolute = if src.starts_with("//") {
            format!("{}:{}", self.origin.scheme(), src)
        } else if src.starts_with('/') {
            resolve_url(&self.origin, src)
        } else if src.starts_with("http://") || src.starts_with("https://") {
            src.to_string()
        } else {
            return None;
        };

        let is_gif = Url::parse(&absolute)
            .map(|u| u.path().to_ascii_lowercase().ends_with(".gif"))
            .unwrap_or(false);
        (!is_gif).then_some(absolute)
    }

    fn truncate_body(&self, text: String) -> String {
        let max = self.limits.max_body_chars;
        match text.grapheme_indices(true).nth(max) {
            Some((cut, _)) => format!("{}{}", &text[..cut], self.limits.truncation_marker),
            None => text,
        }
    }
}

fn image_source(img: ElementRef<'_>) -> Option<&str> {
    IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|attr| Document::attr(img, attr))
        .map(str::trim)
        .find(|src| !src.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(&SiteConfig::default(), ExtractionConfig::default()).unwrap()
    }

    fn descriptor() -> UrlDescriptor {
        UrlDescriptor {
            site_id: "alice".to_string(),
            post_id: "100".to_string(),
            normalized_url: "https://blog.example.com/alice/100".to_string(),
        }
    }

    fn long_text(words: usize) -> String {
        vec!["lorem"; words].join(" ")
    }

    #[test]
    fn test_relative_origin_is_rejected() {
        let site = SiteConfig {
            canonical_origin: "blog.example.com".to_string(),
            ..SiteConfig::default()
        };
        let err = ContentExtractor::new(&site, ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Url(_)));
    }

    #[test]
    fn test_editor_v2_body_used_when_v3_absent() {
        let html = format!(
            r#"<html><body>
                <div class="se_title"> Old editor title </div>
                <div class="se_component_wrap"><p>{}</p><script>track();</script></div>
            </body></html>"#,
            long_text(20)
        );
        let record = extractor().extract(&Document::parse(&html), &descriptor(), "u");

        assert_eq!(record.title, "Old editor title");
        assert_ne!(record.body, BODY_PLACEHOLDER);
        assert!(record.body.starts_with("lorem lorem"));
        assert!(!record.body.contains("track"));
        assert!(record.is_success());
    }

    #[test]
    fn test_v3_markup_preferred() {
        let html = format!(
            r#"<span class="se-title-text">New</span><h1>Site banner</h1>
               <div class="se-main-container">{}</div>"#,
            long_text(15)
        );
        let record = extractor().extract(&Document::parse(&html), &descriptor(), "u");
        assert_eq!(record.title, "New");
    }

    #[test]
    fn test_placeholders_when_nothing_matches() {
        let record = extractor().extract(
            &Document::parse("<html><body><p>hi</p></body></html>"),
            &descriptor(),
            "https://blog.example.com/alice/100",
        );
        assert_eq!(record.title, TITLE_PLACEHOLDER);
        assert_eq!(record.author, "alice");
        assert_eq!(record.date, "");
        assert_eq!(record.body, BODY_PLACEHOLDER);
        assert!(record.images.is_empty());
        assert!(record.tags.is_empty());
        assert!(record.error.is_none());
        assert_eq!(record.site_id, "alice");
        assert_eq!(record.post_id, "100");
    }

    #[test]
    fn test_short_body_candidate_is_skipped() {
        let html = format!(
            r#"<div class="se-main-container">too short</div>
               <article>{}</article>"#,
            long_text(20)
        );
        let record = extractor().extract(&Document::parse(&html), &descriptor(), "u");
        assert!(record.body.starts_with("lorem"));
    }

    #[test]
    fn test_body_truncated_with_marker() {
        let limits = ExtractionConfig {
            min_body_chars: 5,
            max_body_chars: 10,
            truncation_marker: "[...]".to_string(),
        };
        let extractor = ContentExtractor::new(&SiteConfig::default(), limits).unwrap();
        let html = r#"<article>abcdefghijklmnopqrstuvwxyz</article>"#;
        let record = extractor.extract(&Document::parse(html), &descriptor(), "u");
        assert_eq!(record.body, "abcdefghij[...]");
    }

    #[test]
    fn test_image_filtering_and_resolution() {
        let html = r#"<div class="se-main-container">
            <img class="se-image-resource" src="https://cdn.example.com/a.jpg" alt="A" width="640">
            <img class="se-image-resource" src="https://cdn.example.com/a.jpg">
            <img class="se-image-resource" src="data:image/png;base64,AAAA">
            <img class="se-image-resource" src="https://cdn.example.com/spinner.GIF?type=w80">
            <img class="se-image-resource" data-src="//cdn.example.com/b.png" title="B">
            <img class="se-image-resource" src="/static/c.jpeg">
            <img class="se-image-resource" src="relative/d.jpg">
        </div>"#;
        let record = extractor().extract(&Document::parse(html), &descriptor(), "u");
        let urls: Vec<&str> = record.images.iter().map(|i| i.url.as_str()).collect();

        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/a.jpg",
                "https://cdn.example.com/b.png",
                "https://blog.example.com/static/c.jpeg",
            ]
        );
        assert_eq!(record.images[0].alt, "A");
        assert_eq!(record.images[0].width, Some(640));
        assert_eq!(record.images[1].title, "B");
    }

    #[test]
    fn test_generic_images_used_as_last_resort() {
        let html = r#"<p><img src="https://cdn.example.com/x.jpg"></p>"#;
        let record = extractor().extract(&Document::parse(html), &descriptor(), "u");
        assert_eq!(record.images.len(), 1);
    }

    #[test]
    fn test_tags_strip_hash_and_dedupe() {
        let html = r##"<div class="tag_area">
            <a>#travel</a><a>food</a><a>#travel</a><a> </a>
        </div>
        <div class="post_tag"><a>ignored</a></div>"##;
        let record = extractor().extract(&Document::parse(html), &descriptor(), "u");
        let tags: Vec<&str> = record.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["food", "travel"]);
    }
}
