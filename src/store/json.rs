//! JSON 文件存储 (JSON File Store)
//!
//! 将目录落到缓存根下的单个 `catalog.json`。每次变更整体重写，
//! 先写临时文件再原子改名，崩溃时磁盘上始终是一份完整快照。

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::error::{CrawlError, Result};
use crate::core::model::{ChapterRecord, MangaRecord};

use super::{MangaStore, StoredChapter, StoredManga};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    next_id: u64,
    mangas: Vec<StoredManga>,
    chapters: Vec<StoredChapter>,
}

/// JSON 文件存储
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<Catalog>,
}

impl JsonStore {
    /// 打开（或新建）目录文件
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let catalog = if fs::try_exists(&path).await.unwrap_or(false) {
            let raw = fs::read(&path).await?;
            serde_json::from_slice(&raw).map_err(CrawlError::Serialization)?
        } else {
            Catalog::default()
        };

        Ok(Self {
            path,
            state: Mutex::new(catalog),
        })
    }

    /// 将当前快照写回磁盘（临时文件 + 原子改名）
    async fn persist(&self) -> Result<()> {
        let snapshot = {
            let state = self.state.lock();
            serde_json::to_vec_pretty(&*state).map_err(CrawlError::Serialization)?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &snapshot).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl MangaStore for JsonStore {
    async fn find_manga_by_source_url(&self, source_url: &str) -> Result<Option<StoredManga>> {
        let state = self.state.lock();
        Ok(state
            .mangas
            .iter()
            .find(|m| m.record.source_url == source_url)
            .cloned())
    }

    async fn find_manga(&self, id: u64) -> Result<Option<StoredManga>> {
        let state = self.state.lock();
        Ok(state.mangas.iter().find(|m| m.id == id).cloned())
    }

    async fn upsert_manga(&self, record: MangaRecord) -> Result<StoredManga> {
        let stored = {
            let mut state = self.state.lock();

            if let Some(existing) = state
                .mangas
                .iter_mut()
                .find(|m| m.record.source_url == record.source_url)
            {
                existing.record = record;
                existing.updated_at = now();
                existing.clone()
            } else {
                state.next_id += 1;
                let stored = StoredManga {
                    id: state.next_id,
                    record,
                    updated_at: now(),
                };
                state.mangas.push(stored.clone());
                stored
            }
        };

        self.persist().await?;
        Ok(stored)
    }

    async fn upsert_chapter(&self, record: ChapterRecord) -> Result<StoredChapter> {
        if record.images.is_empty() {
            return Err(CrawlError::Persistence(
                "Chapter record rejected: empty image list".into(),
            ));
        }

        let stored = {
            let mut state = self.state.lock();

            if let Some(existing) = state.chapters.iter_mut().find(|c| {
                c.record.manga_id == record.manga_id
                    && c.record.chapter_number == record.chapter_number
            }) {
                existing.record = record;
                existing.updated_at = now();
                existing.clone()
            } else {
                state.next_id += 1;
                let stored = StoredChapter {
                    id: state.next_id,
                    record,
                    updated_at: now(),
                };
                state.chapters.push(stored.clone());
                stored
            }
        };

        self.persist().await?;
        Ok(stored)
    }

    async fn list_chapters(&self, manga_id: u64) -> Result<Vec<StoredChapter>> {
        let state = self.state.lock();
        Ok(state
            .chapters
            .iter()
            .filter(|c| c.record.manga_id == manga_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ChapterNumber;

    fn manga(title: &str) -> MangaRecord {
        MangaRecord {
            source_url: "https://x/m".into(),
            title: title.into(),
            description: "d".into(),
            cover_image: String::new(),
            status: "ongoing".into(),
            author: "a".into(),
            genres: vec!["Action".into()],
        }
    }

    #[tokio::test]
    async fn catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let id = {
            let store = JsonStore::open(&path).await.unwrap();
            let m = store.upsert_manga(manga("Example")).await.unwrap();
            store
                .upsert_chapter(ChapterRecord {
                    manga_id: m.id,
                    chapter_number: ChapterNumber::new("1"),
                    title: "Chapter 1".into(),
                    source_url: "https://x/m/chap-1".into(),
                    images: vec!["temp/example/chapters/chap-1/001.jpg".into()],
                })
                .await
                .unwrap();
            m.id
        };

        let reopened = JsonStore::open(&path).await.unwrap();
        let found = reopened
            .find_manga_by_source_url("https://x/m")
            .await
            .unwrap()
            .expect("manga persisted");
        assert_eq!(found.id, id);
        assert_eq!(found.record.title, "Example");
        assert_eq!(reopened.list_chapters(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("catalog.json")).await.unwrap();

        store.upsert_manga(manga("Old")).await.unwrap();
        let updated = store.upsert_manga(manga("New")).await.unwrap();

        assert_eq!(updated.record.title, "New");
        let all = store.find_manga_by_source_url("https://x/m").await.unwrap();
        assert_eq!(all.unwrap().record.title, "New");
    }
}
