//! Local filesystem storage implementation.
//!
//! Every file is written to a temporary sibling first and renamed into
//! place, so readers never observe a partially written export.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Job, JobStatus, OutputFormat, PostRecord};
use crate::storage::PostSink;

/// Prefixed to CSV exports so spreadsheet tools detect UTF-8.
const UTF8_BOM: &str = "\u{feff}";

const CSV_HEADER: [&str; 8] = [
    "title",
    "author",
    "date",
    "content",
    "site_id",
    "post_id",
    "image_count",
    "tags",
];

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn post_key(post: &PostRecord) -> String {
        format!("posts/{}.json", post.storage_key())
    }

    /// Load a previously stored post.
    pub async fn load_post(&self, site_id: &str, post_id: &str) -> Result<Option<PostRecord>> {
        self.read_json(&format!("posts/{site_id}_{post_id}.json"))
            .await
    }

    /// Export a finished job's results. Only completed jobs with at least
    /// one result can be exported.
    pub async fn export_job(&self, job: &Job, format: OutputFormat) -> Result<PathBuf> {
        if job.status != JobStatus::Completed {
            return Err(AppError::ExportUnavailable {
                id: job.id.clone(),
                reason: format!("job is {}, not completed", job.status),
            });
        }
        if job.results.is_empty() {
            return Err(AppError::ExportUnavailable {
                id: job.id.clone(),
                reason: "job has no results".to_string(),
            });
        }

        let key = format!("exports/job_{}.{}", job.id, format.extension());
        let path = match format {
            OutputFormat::Json => self.write_json(&key, &job.results).await?,
            OutputFormat::Csv => {
                let csv = format!("{UTF8_BOM}{}", render_csv(&job.results));
                self.write_bytes(&key, csv.as_bytes()).await?
            }
        };
        log::info!(
            "Exported {} result(s) of job {} to {}",
            job.results.len(),
            job.id,
            path.display()
        );
        Ok(path)
    }

    /// Write one post as a Markdown document.
    pub async fn export_markdown(&self, post: &PostRecord) -> Result<PathBuf> {
        let key = format!("markdown/{}.md", post.storage_key());
        self.write_bytes(&key, render_markdown(post).as_bytes())
            .await
    }
}

#[async_trait]
impl PostSink for LocalStorage {
    async fn store(&self, post: &PostRecord) -> Result<()> {
        let path = self.write_json(&Self::post_key(post), post).await?;
        log::debug!("Stored {}", path.display());
        Ok(())
    }
}

/// RFC 4180 field quoting.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(posts: &[PostRecord]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");

    for post in posts {
        let tags = post.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        let row = [
            csv_field(&post.title),
            csv_field(&post.author),
            csv_field(&post.date),
            csv_field(&post.body),
            csv_field(&post.site_id),
            csv_field(&post.post_id),
            post.images.len().to_string(),
            csv_field(&tags),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

fn render_markdown(post: &PostRecord) -> String {
    let mut md = format!(
        "# {}\n\n**Author**: {}\n**Date**: {}\n**Source**: {}\n\n",
        post.title, post.author, post.date, post.source_url
    );
    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|t| format!("#{t}")).collect();
        md.push_str(&format!("**Tags**: {}\n\n", tags.join(" ")));
    }
    md.push_str("---\n\n");
    md.push_str(&post.body);
    md.push('\n');

    if !post.images.is_empty() {
        md.push_str("\n## Images\n\n");
        for image in &post.images {
            md.push_str(&format!("![{}]({})\n", image.alt, image.url));
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::models::{ImageRef, ScrapeOptions};

    fn post(site: &str, id: &str, title: &str) -> PostRecord {
        PostRecord {
            title: title.to_string(),
            author: "writer".to_string(),
            date: "2024-01-02".to_string(),
            body: "line one\nline two".to_string(),
            images: vec![ImageRef {
                url: "https://cdn.example.com/a.jpg".to_string(),
                alt: "cover".to_string(),
                title: String::new(),
                width: None,
                height: None,
            }],
            tags: BTreeSet::from(["daily".to_string(), "food".to_string()]),
            site_id: site.to_string(),
            post_id: id.to_string(),
            source_url: format!("https://blog.example.com/{site}/{id}"),
            scraped_at: Utc::now(),
            error: None,
        }
    }

    fn finished_job(posts: Vec<PostRecord>) -> Job {
        let urls = posts.iter().map(|p| p.source_url.clone()).collect();
        let mut job = Job::new(urls, ScrapeOptions::default());
        job.start().unwrap();
        for p in posts {
            job.record(p).unwrap();
        }
        job.finish().unwrap();
        job
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(storage.read_bytes("nope.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_and_load_post() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let original = post("alice", "100", "Hello");

        storage.store(&original).await.unwrap();
        let loaded = storage.load_post("alice", "100").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(tmp.path().join("posts/alice_100.json").exists());
        assert!(!tmp.path().join("posts/alice_100.tmp").exists());
    }

    #[tokio::test]
    async fn test_export_json() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let job = finished_job(vec![post("alice", "1", "One"), post("bob", "2", "Two")]);

        let path = storage.export_job(&job, OutputFormat::Json).await.unwrap();
        assert_eq!(path, tmp.path().join(format!("exports/job_{}.json", job.id)));

        let bytes = tokio::fs::read(&path).await.unwrap();
        let exported: Vec<PostRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[1].title, "Two");
    }

    #[tokio::test]
    async fn test_export_csv_quotes_fields() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let job = finished_job(vec![post("alice", "1", "Hello, \"world\"")]);

        let path = storage.export_job(&job, OutputFormat::Csv).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let text = text.trim_start_matches(UTF8_BOM);
        let mut lines = text.split("\r\n");

        assert_eq!(
            lines.next().unwrap(),
            "title,author,date,content,site_id,post_id,image_count,tags"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"Hello, \"\"world\"\"\",writer,2024-01-02,\"line one\nline two\",alice,1,1,\"daily, food\""
        );
    }

    #[tokio::test]
    async fn test_export_refuses_unfinished_or_empty_jobs() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let pending = Job::new(vec!["u".to_string()], ScrapeOptions::default());
        let err = storage.export_job(&pending, OutputFormat::Json).await.unwrap_err();
        assert!(matches!(err, AppError::ExportUnavailable { .. }));

        let mut failed = Job::new(vec!["u".to_string()], ScrapeOptions::default());
        failed.start().unwrap();
        failed.record(PostRecord::failed("u", None, "boom")).unwrap();
        failed.finish().unwrap();
        assert!(storage.export_job(&failed, OutputFormat::Csv).await.is_err());
    }

    #[tokio::test]
    async fn test_export_markdown() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let path = storage
            .export_markdown(&post("alice", "7", "Notes"))
            .await
            .unwrap();
        let md = tokio::fs::read_to_string(path).await.unwrap();
        assert!(md.starts_with("# Notes\n"));
        assert!(md.contains("**Tags**: #daily #food"));
        assert!(md.contains("![cover](https://cdn.example.com/a.jpg)"));
    }
}
