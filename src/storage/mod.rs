//! Storage abstractions for scraped posts.
//!
//! ## Directory Structure
//!
//! ```text
//! output/
//! ├── posts/                # One JSON file per scraped post
//! │   └── <site>_<post>.json
//! ├── markdown/             # Optional per-post Markdown exports
//! │   └── <site>_<post>.md
//! └── exports/              # Whole-job exports
//!     ├── job_<id>.json
//!     └── job_<id>.csv
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::PostRecord;

// Re-export for convenience
pub use local::LocalStorage;

/// Destination for successfully scraped posts.
///
/// Implementations receive records by reference and must not alter them.
#[async_trait]
pub trait PostSink: Send + Sync {
    async fn store(&self, post: &PostRecord) -> Result<()>;
}
