//! 摄取编排器 (Ingestion Orchestrator)
//!
//! 自顶向下驱动整条流水线：
//! 详情页 -> 封面缓存 -> 漫画 upsert -> 章节列表 -> 逐章节
//! (抓取 -> 提取 -> 图片批量下载 -> 落库) -> 运行汇总。
//!
//! 失败分两档：漫画身份建立阶段（详情 / 章节列表）失败即整次运行
//! 终止——没有可挂接外键的漫画行；单章节 / 单图片失败被捕获记入
//! 失败清单，运行照常完成。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{AssetCache, ImageTransform};
use crate::core::config::AppConfig;
use crate::core::error::{CrawlError, Result};
use crate::core::event::{CrawlEvent, EventSender};
use crate::core::model::{
    ChapterFailure, ChapterListingEntry, ChapterNumber, ChapterOutcomes, ChapterRecord,
    ChapterSummary, CrawlRunResult, MangaListing, MangaSnapshot, RunMetadata, RunStatistics,
};
use crate::extract::{ChapterExtract, Extractor};
use crate::network::HttpFetcher;
use crate::store::{MangaStore, StoredChapter, StoredManga};

use super::batch::{BatchOptions, process_batch};

/// 抓取范围
#[derive(Debug, Clone)]
pub enum CrawlScope {
    /// 全量回溯整个目录
    Full,
    /// 只抓最旧的一章（新漫画引导）
    FirstChapter,
    /// 只抓指定章节号（失败子集手工重试）
    Chapter(ChapterNumber),
}

/// 摄取编排器
///
/// 持久化网关由调用方构造并注入，生命周期归调用方所有。
pub struct Ingestor {
    config: Arc<AppConfig>,
    fetcher: HttpFetcher,
    extractor: Extractor,
    cache: AssetCache,
    store: Arc<dyn MangaStore>,
    events: Option<EventSender>,
    shutdown: CancellationToken,
}

impl Ingestor {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn MangaStore>) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        let extractor = Extractor::new(config.site.clone())?;
        let cache = AssetCache::new(&config.cache_path, fetcher.clone());

        Ok(Self {
            config,
            fetcher,
            extractor,
            cache,
            store,
            events: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// 注入事件发送器
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// 注入取消令牌（在批次边界生效）
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// 注入图片后处理变换
    pub fn with_transform(mut self, transform: Arc<dyn ImageTransform>) -> Self {
        self.cache = AssetCache::new(&self.config.cache_path, self.fetcher.clone())
            .with_transform(transform);
        self
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref events) = self.events {
            events.emit(event);
        }
    }

    /// 抓取并保存一部漫画及其章节
    pub async fn ingest_manga(&self, manga_url: &str, scope: CrawlScope) -> Result<CrawlRunResult> {
        match self.ingest_manga_inner(manga_url, scope).await {
            Ok(run) => Ok(run),
            Err(e) => {
                self.emit(CrawlEvent::RunFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn ingest_manga_inner(
        &self,
        manga_url: &str,
        scope: CrawlScope,
    ) -> Result<CrawlRunResult> {
        let started = Instant::now();
        let crawled_at = chrono::Utc::now().to_rfc3339();

        // 1. 漫画详情
        info!("开始抓取漫画: {}", manga_url);
        let detail_html = self.fetcher.get_text(manga_url).await?;
        let mut record = self.extractor.manga_detail(&detail_html, manga_url)?;
        info!("漫画: {} ({})", record.title, record.author);

        // 2. 封面缓存（失败即致命：没有封面路径的漫画行不落库）
        if !record.cover_image.is_empty() {
            let path = self
                .cache
                .ensure_cover(&record.cover_image, &record.title)
                .await?;
            record.cover_image = path.display().to_string();
            self.emit(CrawlEvent::CoverCached {
                path: record.cover_image.clone(),
            });
        }

        // 3. 漫画 upsert：自然键 source_url，重复抓取更新原行
        let manga = self.store.upsert_manga(record).await?;
        self.emit(CrawlEvent::RunStarted {
            source_url: manga_url.to_string(),
            title: manga.record.title.clone(),
        });

        // 4. 章节列表（独立抓取阶段，失败同样致命）
        let list_html = self.fetcher.get_text(manga_url).await?;
        let mut entries = self.extractor.chapter_list(&list_html, manga_url)?;

        match &scope {
            CrawlScope::Full => {}
            CrawlScope::FirstChapter => entries.truncate(1),
            CrawlScope::Chapter(number) => entries.retain(|e| e.chapter_number == *number),
        }

        let total_chapters = entries.len();
        self.emit(CrawlEvent::ChaptersDiscovered {
            total: total_chapters,
        });
        info!("共发现 {} 个章节（范围: {:?}）", total_chapters, scope);

        // 5. 逐章节批处理（旧章在前，单章失败不终止运行）
        let chapter_options = BatchOptions::new(
            self.config.crawler.chapter_concurrency,
            self.config.crawler.chapter_pause_ms,
        );
        let completed = Arc::new(AtomicUsize::new(0));

        // 闭包须可重复调用，向 future 传共享借用而非所有权
        let manga_ref = &manga;
        let results = process_batch(
            entries.clone(),
            &chapter_options,
            &self.shutdown,
            |entry| {
                let completed = completed.clone();
                async move {
                    let result = self.process_chapter(&entry, manga_ref).await;
                    let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.emit(CrawlEvent::ChapterProgress {
                        current,
                        total: total_chapters,
                        number: entry.chapter_number.clone(),
                    });
                    match &result {
                        Ok(stored) => self.emit(CrawlEvent::ChapterCompleted {
                            number: stored.record.chapter_number.clone(),
                            image_count: stored.record.images.len(),
                        }),
                        Err(e) => self.emit(CrawlEvent::ChapterFailed {
                            number: entry.chapter_number.clone(),
                            error: e.to_string(),
                        }),
                    }
                    result
                }
            },
        )
        .await;

        // 6. 汇总
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for (entry, result) in entries.into_iter().zip(results) {
            match result {
                Ok(stored) => successful.push(ChapterSummary {
                    number: stored.record.chapter_number.clone(),
                    title: stored.record.title.clone(),
                    image_count: stored.record.images.len(),
                    local_paths: stored.record.images,
                }),
                Err(e) => {
                    warn!("章节 {} 处理失败: {}", entry.chapter_number, e);
                    failed.push(ChapterFailure {
                        number: entry.chapter_number,
                        url: entry.url,
                        error: e.to_string(),
                    });
                }
            }
        }

        let statistics =
            RunStatistics::from_counts(total_chapters, successful.len(), failed.len());
        self.emit(CrawlEvent::RunCompleted {
            successful: successful.len(),
            failed: failed.len(),
            total: total_chapters,
        });
        info!(
            "抓取完成: {} (成功 {}/{}，失败 {})",
            manga.record.title,
            successful.len(),
            total_chapters,
            failed.len()
        );

        Ok(CrawlRunResult {
            manga: MangaSnapshot {
                id: manga.id,
                title: manga.record.title.clone(),
                author: manga.record.author.clone(),
                cover: manga.record.cover_image.clone(),
                total_chapters,
            },
            statistics,
            chapters: ChapterOutcomes { successful, failed },
            metadata: RunMetadata {
                source: self
                    .extractor
                    .base_url()
                    .host_str()
                    .unwrap_or_default()
                    .to_string(),
                crawled_at,
                execution_time: format!("{:.2}s", started.elapsed().as_secs_f64()),
            },
        })
    }

    /// 抓取并更新单个章节（外部触发面第二操作）
    pub async fn update_chapter(
        &self,
        manga_id: u64,
        chapter_url: &str,
    ) -> Result<StoredChapter> {
        let manga = self.store.find_manga(manga_id).await?.ok_or_else(|| {
            CrawlError::Persistence(format!("Manga {manga_id} not found"))
        })?;

        let html = self.fetcher.get_text(chapter_url).await?;
        let extract = self.extractor.chapter(&html, chapter_url)?;
        if extract.number.is_empty() {
            return Err(CrawlError::Extraction(format!(
                "Chapter number could not be determined at {chapter_url}"
            )));
        }

        let number = extract.number.clone();
        self.persist_chapter(chapter_url, extract, number, &manga)
            .await
    }

    /// 处理单个章节：抓取 -> 提取 -> 图片下载 -> 落库
    async fn process_chapter(
        &self,
        entry: &ChapterListingEntry,
        manga: &StoredManga,
    ) -> Result<StoredChapter> {
        let html = self.fetcher.get_text(&entry.url).await?;
        let extract = self.extractor.chapter(&html, &entry.url)?;

        // 章节号解析链：页面标题 -> 页面 URL -> 列表条目
        let number = if extract.number.is_empty() {
            entry.chapter_number.clone()
        } else {
            extract.number.clone()
        };

        self.persist_chapter(&entry.url, extract, number, manga).await
    }

    async fn persist_chapter(
        &self,
        url: &str,
        extract: ChapterExtract,
        number: ChapterNumber,
        manga: &StoredManga,
    ) -> Result<StoredChapter> {
        let total_images = extract.image_urls.len();
        let image_options = BatchOptions::new(
            self.config.crawler.image_concurrency,
            self.config.crawler.batch_pause_ms,
        );

        let indexed: Vec<(usize, String)> =
            extract.image_urls.into_iter().enumerate().collect();
        let downloaded = Arc::new(AtomicUsize::new(0));

        let results = process_batch(indexed, &image_options, &self.shutdown, |(i, img_url)| {
            let number = number.clone();
            let title = manga.record.title.clone();
            let downloaded = downloaded.clone();
            async move {
                let result = self.cache.ensure_page(&img_url, &title, &number, i).await;
                if result.is_ok() {
                    let done = downloaded.fetch_add(1, Ordering::SeqCst) + 1;
                    self.emit(CrawlEvent::ImageProgress {
                        downloaded: done,
                        total: total_images,
                    });
                }
                result
            }
        })
        .await;

        // 单图失败已被批处理器记录；过滤后保持页序
        let images: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|p| p.display().to_string())
            .collect();

        if images.is_empty() {
            return Err(CrawlError::Download(format!(
                "Failed to save any images for chapter {number} ({url})"
            )));
        }
        if images.len() < total_images {
            warn!(
                "章节 {} 仅保存 {}/{} 张图片",
                number,
                images.len(),
                total_images
            );
        }

        self.store
            .upsert_chapter(ChapterRecord {
                manga_id: manga.id,
                chapter_number: number,
                title: extract.title,
                source_url: url.to_string(),
                images,
            })
            .await
    }

    /// 翻页抓取列表页
    ///
    /// 空页即停止；单页失败记日志后继续下一页；
    /// 所有页面合计为零条目才是错误。
    pub async fn crawl_listing_pages(&self, max_pages: usize) -> Result<Vec<MangaListing>> {
        let mut all = Vec::new();
        let page_pause =
            std::time::Duration::from_millis(self.config.crawler.page_pause_ms);

        for page in 1..=max_pages.max(1) {
            if self.shutdown.is_cancelled() {
                break;
            }

            let url = self.extractor.listing_page_url(page);
            let html = match self.fetcher.get_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("列表第 {} 页抓取失败: {}", page, e);
                    // 失败页同样计入限速节奏
                    tokio::time::sleep(page_pause).await;
                    continue;
                }
            };

            let listings = self.extractor.listing(&html);
            if listings.is_empty() {
                info!("列表第 {} 页为空，停止翻页", page);
                break;
            }

            info!("列表第 {} 页发现 {} 部漫画", page, listings.len());
            all.extend(listings);

            if page < max_pages {
                tokio::time::sleep(page_pause).await;
            }
        }

        if all.is_empty() {
            return Err(CrawlError::Extraction(
                "No manga listings found across all pages".into(),
            ));
        }
        Ok(all)
    }

    /// 列表驱动的批量摄取
    ///
    /// `full` 为假时每部漫画只引导最旧一章。单部漫画失败跳过继续。
    pub async fn ingest_catalog(&self, full: bool) -> Result<Vec<CrawlRunResult>> {
        let listings = self
            .crawl_listing_pages(self.config.crawler.max_listing_pages)
            .await?;

        let scope = if full {
            CrawlScope::Full
        } else {
            CrawlScope::FirstChapter
        };

        let mut runs = Vec::new();
        for listing in listings {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.ingest_manga(&listing.url, scope.clone()).await {
                Ok(run) => runs.push(run),
                Err(e) => {
                    warn!("漫画 {} 摄取失败: {}", listing.title, e);
                    continue;
                }
            }
        }
        Ok(runs)
    }
}
