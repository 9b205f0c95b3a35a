//! 持久化网关 (Persistence Gateway)
//!
//! 系统与外部数据存储的唯一接触点。漫画以 `source_url` 为自然键
//! 执行 upsert，章节以 `(manga_id, chapter_number)` 为键执行 upsert，
//! 重复抓取永不产生重复行。
//!
//! 网关实例由调用方显式构造并注入编排器，不存在模块级全局客户端。

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::model::{ChapterRecord, MangaRecord};

/// 已落库的漫画行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredManga {
    pub id: u64,
    #[serde(flatten)]
    pub record: MangaRecord,
    pub updated_at: String,
}

/// 已落库的章节行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChapter {
    pub id: u64,
    #[serde(flatten)]
    pub record: ChapterRecord,
    pub updated_at: String,
}

/// 持久化网关接口
///
/// 编排器只依赖这一 trait；生产实现落 JSON 文件目录，
/// 测试实现驻内存。任一操作失败以 `CrawlError::Persistence` 上抛。
#[async_trait]
pub trait MangaStore: Send + Sync {
    /// 按自然键查找漫画
    async fn find_manga_by_source_url(&self, source_url: &str) -> Result<Option<StoredManga>>;

    /// 按 id 查找漫画
    async fn find_manga(&self, id: u64) -> Result<Option<StoredManga>>;

    /// 插入或更新漫画（键：`source_url`）
    ///
    /// 命中时更新可变字段并刷新时间戳，返回更新后的行。
    async fn upsert_manga(&self, record: MangaRecord) -> Result<StoredManga>;

    /// 插入或更新章节（键：`(manga_id, chapter_number)`）
    ///
    /// `images` 为空的记录被拒绝：章节行只在全部图片确认落盘后写入。
    async fn upsert_chapter(&self, record: ChapterRecord) -> Result<StoredChapter>;

    /// 列出某漫画的全部章节
    async fn list_chapters(&self, manga_id: u64) -> Result<Vec<StoredChapter>>;
}
