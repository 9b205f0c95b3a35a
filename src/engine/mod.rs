//! 抓取引擎 (Crawl Engine)

pub mod batch;
pub mod orchestrator;

pub use batch::{BatchOptions, process_batch};
pub use orchestrator::{CrawlScope, Ingestor};
