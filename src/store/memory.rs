//! 内存存储 (In-memory Store)
//!
//! 供测试与演练使用的网关实现，语义与生产实现完全一致。

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::error::{CrawlError, Result};
use crate::core::model::{ChapterRecord, MangaRecord};

use super::{MangaStore, StoredChapter, StoredManga};

#[derive(Default)]
struct Inner {
    next_id: u64,
    mangas: Vec<StoredManga>,
    chapters: Vec<StoredChapter>,
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前漫画行数（测试断言用）
    pub fn manga_count(&self) -> usize {
        self.inner.lock().mangas.len()
    }

    /// 当前章节行数（测试断言用）
    pub fn chapter_count(&self) -> usize {
        self.inner.lock().chapters.len()
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl MangaStore for MemoryStore {
    async fn find_manga_by_source_url(&self, source_url: &str) -> Result<Option<StoredManga>> {
        let inner = self.inner.lock();
        Ok(inner
            .mangas
            .iter()
            .find(|m| m.record.source_url == source_url)
            .cloned())
    }

    async fn find_manga(&self, id: u64) -> Result<Option<StoredManga>> {
        let inner = self.inner.lock();
        Ok(inner.mangas.iter().find(|m| m.id == id).cloned())
    }

    async fn upsert_manga(&self, record: MangaRecord) -> Result<StoredManga> {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner
            .mangas
            .iter_mut()
            .find(|m| m.record.source_url == record.source_url)
        {
            existing.record = record;
            existing.updated_at = now();
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let stored = StoredManga {
            id: inner.next_id,
            record,
            updated_at: now(),
        };
        inner.mangas.push(stored.clone());
        Ok(stored)
    }

    async fn upsert_chapter(&self, record: ChapterRecord) -> Result<StoredChapter> {
        if record.images.is_empty() {
            return Err(CrawlError::Persistence(
                "Chapter record rejected: empty image list".into(),
            ));
        }

        let mut inner = self.inner.lock();

        if let Some(existing) = inner.chapters.iter_mut().find(|c| {
            c.record.manga_id == record.manga_id
                && c.record.chapter_number == record.chapter_number
        }) {
            existing.record = record;
            existing.updated_at = now();
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let stored = StoredChapter {
            id: inner.next_id,
            record,
            updated_at: now(),
        };
        inner.chapters.push(stored.clone());
        Ok(stored)
    }

    async fn list_chapters(&self, manga_id: u64) -> Result<Vec<StoredChapter>> {
        let inner = self.inner.lock();
        Ok(inner
            .chapters
            .iter()
            .filter(|c| c.record.manga_id == manga_id)
            .cloned()
            .collect())
    }
}
