//! Post data structures.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog post URL that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlDescriptor {
    /// Blog (account) identifier
    pub site_id: String,

    /// Numeric post identifier within the blog
    pub post_id: String,

    /// Canonical desktop URL of the post
    pub normalized_url: String,
}

/// An image referenced by a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute image URL
    pub url: String,

    #[serde(default)]
    pub alt: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Structured extraction result for one URL.
///
/// Every scrape attempt yields exactly one record. When `error` is set the
/// textual fields hold placeholders describing the failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub title: String,
    pub author: String,
    pub date: String,
    pub body: String,

    #[serde(default)]
    pub images: Vec<ImageRef>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    pub site_id: String,
    pub post_id: String,

    /// URL as submitted by the caller
    pub source_url: String,

    pub scraped_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PostRecord {
    /// Build the error-flavored record for a URL that could not be scraped.
    pub fn failed(
        source_url: &str,
        descriptor: Option<&UrlDescriptor>,
        error: impl std::fmt::Display,
    ) -> Self {
        let error = error.to_string();
        Self {
            title: format!("scrape failed: {source_url}"),
            author: "unknown".to_string(),
            date: String::new(),
            body: format!("error: {error}"),
            images: Vec::new(),
            tags: BTreeSet::new(),
            site_id: descriptor.map(|d| d.site_id.clone()).unwrap_or_default(),
            post_id: descriptor.map(|d| d.post_id.clone()).unwrap_or_default(),
            source_url: source_url.to_string(),
            scraped_at: Utc::now(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Stable `<site>_<post>` key used for file names.
    pub fn storage_key(&self) -> String {
        let site = if self.site_id.is_empty() {
            "unknown"
        } else {
            &self.site_id
        };
        format!("{}_{}", site, self.post_id)
    }
}
