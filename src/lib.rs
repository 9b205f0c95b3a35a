//! manga-spider: 漫画站点抓取与摄取流水线 (Manga Crawling & Ingestion Pipeline)
//!
//! 针对章节制漫画站点的完整摄取链路：HTTP 抓取（固定间隔重试）、
//! 选择器驱动的 HTML 提取、确定性路径的资源缓存、受限并发批处理、
//! 容忍部分失败的运行编排，以及可注入的持久化网关。

pub mod cache;
pub mod core;
pub mod engine;
pub mod extract;
pub mod network;
pub mod store;
pub mod ui;
pub mod utils;

pub use cache::{AssetCache, IdentityTransform, ImageTransform};
pub use core::config::AppConfig;
pub use core::error::{CrawlError, Result};
pub use core::event::{CrawlEvent, EventReceiver, EventSender, create_event_channel};
pub use core::model::{ChapterNumber, ChapterRecord, CrawlRunResult, MangaRecord};
pub use engine::{CrawlScope, Ingestor};
pub use extract::Extractor;
pub use network::HttpFetcher;
pub use store::{JsonStore, MangaStore, MemoryStore};
