//! Service layer for the scraper.
//!
//! This module contains the business logic for:
//! - URL validation (`UrlValidator`)
//! - Page rendering (`Renderer`, `HttpRenderer`)
//! - Field extraction (`ContentExtractor`)
//! - The per-URL scrape operation (`Scraper`)

pub mod document;
mod extractor;
mod renderer;
mod scrape;
mod validator;

pub use document::Document;
pub use extractor::{BODY_PLACEHOLDER, ContentExtractor, TITLE_PLACEHOLDER};
pub use renderer::{HttpRenderer, PageContext, RenderOptions, Renderer};
pub use scrape::{ScrapeOutcome, Scraper};
pub use validator::UrlValidator;
