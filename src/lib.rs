// src/lib.rs

//! blogscrape: blog post scraping through a job queue

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
