//! Blog post URL validation.
//!
//! Classifies input URLs against the platform's known URL shapes and
//! normalizes them to the canonical desktop form.

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{SiteConfig, UrlDescriptor};

/// How a pattern recognizes a post URL.
#[derive(Debug)]
enum Matcher {
    /// `/<site_id>/<post_id>` on a given host
    Path(Regex),
    /// `/<viewer path>?blogId=<site_id>&logNo=<post_id>` on a given host
    Query { host: String, path: String },
}

/// A named URL shape.
#[derive(Debug)]
struct UrlPattern {
    name: &'static str,
    matcher: Matcher,
}

/// Validates and normalizes blog post URLs.
///
/// Patterns are tried in a fixed order (desktop path, mobile path,
/// query-parameter viewer). The first match wins.
#[derive(Debug)]
pub struct UrlValidator {
    allowed_domains: Vec<String>,
    patterns: Vec<UrlPattern>,
    canonical_origin: String,
}

impl UrlValidator {
    /// Build a validator for the configured hosts.
    pub fn new(site: &SiteConfig) -> Result<Self> {
        let patterns = vec![
            UrlPattern {
                name: "desktop",
                matcher: Matcher::Path(Self::path_regex(&site.desktop_host)?),
            },
            UrlPattern {
                name: "mobile",
                matcher: Matcher::Path(Self::path_regex(&site.mobile_host)?),
            },
            UrlPattern {
                name: "post_view",
                matcher: Matcher::Query {
                    host: site.desktop_host.to_lowercase(),
                    path: site.post_view_path.clone(),
                },
            },
        ];

        Ok(Self {
            allowed_domains: site
                .allowed_domains()
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            patterns,
            canonical_origin: site.canonical_origin.trim_end_matches('/').to_string(),
        })
    }

    /// Parse a URL into a descriptor, or reject it with `InvalidUrl`.
    pub fn parse(&self, input: &str) -> Result<UrlDescriptor> {
        self.classify(input).map(|(_, descriptor)| descriptor)
    }

    /// Parse a URL and report which pattern recognized it.
    pub fn classify(&self, input: &str) -> Result<(&'static str, UrlDescriptor)> {
        let input = input.trim();
        let parsed = Url::parse(input).map_err(|e| AppError::invalid_url(input, e))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::invalid_url(
                input,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let host = parsed.host_str().unwrap_or_default();
        if !self.allowed_domains.iter().any(|d| d == host) {
            return Err(AppError::invalid_url(
                input,
                format!("domain '{host}' is not allowed"),
            ));
        }

        self.patterns
            .iter()
            .find_map(|pattern| {
                Self::match_pattern(&pattern.matcher, &parsed).map(|(site_id, post_id)| {
                    log::debug!("URL {} matched pattern '{}'", input, pattern.name);
                    (pattern.name, self.descriptor(site_id, post_id))
                })
            })
            .ok_or_else(|| AppError::invalid_url(input, "not a recognized blog post URL"))
    }

    fn match_pattern(matcher: &Matcher, url: &Url) -> Option<(String, String)> {
        match matcher {
            Matcher::Path(regex) => {
                let caps = regex.captures(url.as_str())?;
                Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
            }
            Matcher::Query { host, path } => {
                if url.host_str() != Some(host.as_str()) {
                    return None;
                }
                let on_viewer = url
                    .path_segments()
                    .and_then(|mut segments| segments.next())
                    .is_some_and(|first| {
                        first == path.as_str() || first.starts_with(&format!("{path}."))
                    });
                if !on_viewer {
                    return None;
                }

                let mut site_id = None;
                let mut post_id = None;
                for (key, value) in url.query_pairs() {
                    match key.as_ref() {
                        "blogId" if is_site_id(&value) => site_id = Some(value.to_string()),
                        "logNo" if is_post_number(&value) => post_id = Some(value.to_string()),
                        _ => {}
                    }
                }
                Some((site_id?, post_id?))
            }
        }
    }

    fn descriptor(&self, site_id: String, post_id: String) -> UrlDescriptor {
        let normalized_url = format!("{}/{}/{}", self.canonical_origin, site_id, post_id);
        UrlDescriptor {
            site_id,
            post_id,
            normalized_url,
        }
    }

    fn path_regex(host: &str) -> Result<Regex> {
        let pattern = format!(
            r"^https?://{}/([A-Za-z0-9_-]+)/(\d+)/?(?:[?#].*)?$",
            regex::escape(&host.to_lowercase())
        );
        Regex::new(&pattern).map_err(|e| AppError::config(format!("bad host pattern: {e}")))
    }
}

/// Site ids end up in file names and URLs, so only `[A-Za-z0-9_-]` is accepted.
fn is_site_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_post_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}
