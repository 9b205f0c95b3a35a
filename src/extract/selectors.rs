//! 选择器编译 (Selector Compilation)
//!
//! 将配置中的选择器字符串一次性编译为 `scraper::Selector`。
//! 编译失败属于配置期错误，启动即报，不进入抓取流程。

use scraper::Selector;

use crate::core::config::SelectorConfig;
use crate::core::error::{CrawlError, Result};

/// 漫画详情页选择器（已编译）
#[derive(Debug)]
pub struct MangaPageSelectors {
    pub title: Selector,
    pub description: Selector,
    pub cover: Selector,
    pub status: Selector,
    pub author: Selector,
    pub genres: Selector,
}

/// 章节页选择器（已编译）
#[derive(Debug)]
pub struct ChapterPageSelectors {
    pub title: Selector,
    pub images: Selector,
}

/// 章节列表选择器（已编译）
#[derive(Debug)]
pub struct ChapterListPageSelectors {
    pub item: Selector,
    pub link: Selector,
    pub date: Selector,
}

/// 列表页选择器（已编译）
#[derive(Debug)]
pub struct ListingPageSelectors {
    pub item: Selector,
    pub title: Selector,
    pub link: Selector,
    pub cover: Selector,
}

/// 全部页面类型的选择器集合
#[derive(Debug)]
pub struct SiteSelectors {
    pub manga: MangaPageSelectors,
    pub chapter: ChapterPageSelectors,
    pub chapter_list: ChapterListPageSelectors,
    pub listing: ListingPageSelectors,
}

fn compile(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| CrawlError::Selector {
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

impl SiteSelectors {
    /// 由配置编译选择器集合
    pub fn compile(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            manga: MangaPageSelectors {
                title: compile(&config.manga.title)?,
                description: compile(&config.manga.description)?,
                cover: compile(&config.manga.cover)?,
                status: compile(&config.manga.status)?,
                author: compile(&config.manga.author)?,
                genres: compile(&config.manga.genres)?,
            },
            chapter: ChapterPageSelectors {
                title: compile(&config.chapter.title)?,
                images: compile(&config.chapter.images)?,
            },
            chapter_list: ChapterListPageSelectors {
                item: compile(&config.chapter_list.item)?,
                link: compile(&config.chapter_list.link)?,
                date: compile(&config.chapter_list.date)?,
            },
            listing: ListingPageSelectors {
                item: compile(&config.listing.item)?,
                title: compile(&config.listing.title)?,
                link: compile(&config.listing.link)?,
                cover: compile(&config.listing.cover)?,
            },
        })
    }
}
