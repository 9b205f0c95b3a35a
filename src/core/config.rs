//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持默认值回退机制。
//! 站点的选择器集合、批次大小、重试参数全部外置于配置，
//! 更换目标站点或调整吞吐量无需改动代码。

use std::path::Path;

use bon::Builder;
use config::{Config, File};
use serde::Deserialize;

use crate::core::error::{CrawlError, Result};

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct AppConfig {
    /// 图片缓存目录基准路径
    #[serde(default = "default_cache_path")]
    pub cache_path: String,

    /// 目标站点配置（域名 + 选择器集合）
    #[serde(default)]
    pub site: SiteConfig,

    /// 爬虫调度参数
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

/// 站点配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct SiteConfig {
    /// 站点基准 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 伪装浏览器的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// 各页面类型的选择器集合
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// 调度参数
///
/// 默认值复刻既有爬虫的观测行为：3 次尝试、固定 1 秒间隔、
/// 2-3 并发章节、批次间 500ms 停顿、翻页间 2 秒停顿。
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct CrawlerConfig {
    /// 单个请求的最大尝试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 重试间隔（固定延迟，无指数退避）
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// 单请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 章节并发上限
    #[serde(default = "default_chapter_concurrency")]
    pub chapter_concurrency: usize,
    /// 单章节内图片并发上限
    #[serde(default = "default_image_concurrency")]
    pub image_concurrency: usize,
    /// 图片批次之间的停顿
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// 章节批次之间的停顿
    #[serde(default = "default_chapter_pause_ms")]
    pub chapter_pause_ms: u64,
    /// 列表翻页之间的停顿
    #[serde(default = "default_page_pause_ms")]
    pub page_pause_ms: u64,
    /// 列表页抓取上限
    #[serde(default = "default_max_listing_pages")]
    pub max_listing_pages: usize,
}

/// 各页面类型的选择器集合
///
/// 默认值对应 truyenqq 风格的站点结构，全部可被 `config.toml` 覆盖。
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct SelectorConfig {
    #[serde(default)]
    pub manga: MangaSelectors,
    #[serde(default)]
    pub chapter: ChapterSelectors,
    #[serde(default)]
    pub chapter_list: ChapterListSelectors,
    #[serde(default)]
    pub listing: ListingSelectors,
}

/// 漫画详情页选择器
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct MangaSelectors {
    #[serde(default = "d_manga_title")]
    pub title: String,
    #[serde(default = "d_manga_description")]
    pub description: String,
    #[serde(default = "d_manga_cover")]
    pub cover: String,
    #[serde(default = "d_manga_status")]
    pub status: String,
    #[serde(default = "d_manga_author")]
    pub author: String,
    #[serde(default = "d_manga_genres")]
    pub genres: String,
    /// 状态字段携带的标签前缀，提取后剥除
    #[serde(default = "d_status_label")]
    pub status_label: String,
    /// 作者字段携带的标签前缀，提取后剥除
    #[serde(default = "d_author_label")]
    pub author_label: String,
}

/// 章节页选择器
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ChapterSelectors {
    #[serde(default = "d_chapter_title")]
    pub title: String,
    #[serde(default = "d_chapter_images")]
    pub images: String,
    /// 图片 URL 属性的取用优先级（懒加载属性优先于 src）
    #[serde(default = "d_image_attrs")]
    pub image_attrs: Vec<String>,
    /// 标题中章节号的前缀标记（大小写不敏感）
    #[serde(default = "d_number_prefixes")]
    pub number_prefixes: Vec<String>,
    /// URL 路径中章节号的标记段
    #[serde(default = "d_url_number_marker")]
    pub url_number_marker: String,
}

/// 章节列表选择器
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ChapterListSelectors {
    #[serde(default = "d_chapter_list_item")]
    pub item: String,
    #[serde(default = "d_chapter_list_link")]
    pub link: String,
    #[serde(default = "d_chapter_list_date")]
    pub date: String,
    /// 链接文本中的章节号标签（如 "Chương 2.5" -> "2.5"）
    #[serde(default = "d_chapter_list_label")]
    pub number_label: String,
}

/// 列表页（目录索引）选择器
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct ListingSelectors {
    #[serde(default = "d_listing_item")]
    pub item: String,
    #[serde(default = "d_listing_title")]
    pub title: String,
    #[serde(default = "d_listing_link")]
    pub link: String,
    #[serde(default = "d_listing_cover")]
    pub cover: String,
    /// 列表页 URL 模板，`{page}` 会被页码替换
    #[serde(default = "d_listing_path")]
    pub page_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_timeout_secs(),
            chapter_concurrency: default_chapter_concurrency(),
            image_concurrency: default_image_concurrency(),
            batch_pause_ms: default_batch_pause_ms(),
            chapter_pause_ms: default_chapter_pause_ms(),
            page_pause_ms: default_page_pause_ms(),
            max_listing_pages: default_max_listing_pages(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            manga: MangaSelectors::default(),
            chapter: ChapterSelectors::default(),
            chapter_list: ChapterListSelectors::default(),
            listing: ListingSelectors::default(),
        }
    }
}

impl Default for MangaSelectors {
    fn default() -> Self {
        Self {
            title: d_manga_title(),
            description: d_manga_description(),
            cover: d_manga_cover(),
            status: d_manga_status(),
            author: d_manga_author(),
            genres: d_manga_genres(),
            status_label: d_status_label(),
            author_label: d_author_label(),
        }
    }
}

impl Default for ChapterSelectors {
    fn default() -> Self {
        Self {
            title: d_chapter_title(),
            images: d_chapter_images(),
            image_attrs: d_image_attrs(),
            number_prefixes: d_number_prefixes(),
            url_number_marker: d_url_number_marker(),
        }
    }
}

impl Default for ChapterListSelectors {
    fn default() -> Self {
        Self {
            item: d_chapter_list_item(),
            link: d_chapter_list_link(),
            date: d_chapter_list_date(),
            number_label: d_chapter_list_label(),
        }
    }
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item: d_listing_item(),
            title: d_listing_title(),
            link: d_listing_link(),
            cover: d_listing_cover(),
            page_path: d_listing_path(),
        }
    }
}

fn default_cache_path() -> String {
    "temp".to_string()
}
fn default_base_url() -> String {
    "https://truyenqqto.com".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_chapter_concurrency() -> usize {
    3
}
fn default_image_concurrency() -> usize {
    3
}
fn default_batch_pause_ms() -> u64 {
    500
}
fn default_chapter_pause_ms() -> u64 {
    1000
}
fn default_page_pause_ms() -> u64 {
    2000
}
fn default_max_listing_pages() -> usize {
    10
}

fn d_manga_title() -> String {
    ".book_detail h1".into()
}
fn d_manga_description() -> String {
    ".detail-content p".into()
}
fn d_manga_cover() -> String {
    ".book_avatar img".into()
}
fn d_manga_status() -> String {
    ".book_info .status p".into()
}
fn d_manga_author() -> String {
    ".book_info .author p".into()
}
fn d_manga_genres() -> String {
    ".list01 .li03 a".into()
}
fn d_status_label() -> String {
    "Tình trạng".into()
}
fn d_author_label() -> String {
    "Tác giả".into()
}
fn d_chapter_title() -> String {
    ".chapter-title".into()
}
fn d_chapter_images() -> String {
    ".page-chapter img".into()
}
fn d_image_attrs() -> Vec<String> {
    vec!["data-original".into(), "data-cdn".into(), "src".into()]
}
fn d_number_prefixes() -> Vec<String> {
    vec!["Chapter".into(), "Chương".into()]
}
fn d_url_number_marker() -> String {
    "chap-".into()
}
fn d_chapter_list_item() -> String {
    ".list_chapter .works-chapter-list .works-chapter-item".into()
}
fn d_chapter_list_link() -> String {
    ".name-chap a".into()
}
fn d_chapter_list_date() -> String {
    ".time-chap".into()
}
fn d_chapter_list_label() -> String {
    "Chương".into()
}
fn d_listing_item() -> String {
    ".list-story .story-item".into()
}
fn d_listing_title() -> String {
    ".story-name".into()
}
fn d_listing_link() -> String {
    "a".into()
}
fn d_listing_cover() -> String {
    "img".into()
}
fn d_listing_path() -> String {
    "/danh-sach?page={page}".into()
}

impl AppConfig {
    /// 从文件系统中加载并解析配置
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// 从指定路径加载配置，缺失时回退到全部默认值
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if config_path.exists() {
            builder.add_source(File::from(config_path))
        } else {
            builder
        };

        let settings = builder.build().map_err(CrawlError::Config)?;
        settings.try_deserialize().map_err(CrawlError::Config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            site: SiteConfig::default(),
            crawler: CrawlerConfig::default(),
        }
    }
}
