//! HTML 提取器 (HTML Extractor)
//!
//! 面向三种页面类型（列表 / 详情 / 章节）的结构化字段提取。
//! 选择器来自配置而非硬编码，更换目标站点不触及这里的逻辑。
//! 提取是同步纯函数：输入 HTML 文本，输出领域结构。

mod selectors;

pub use selectors::SiteSelectors;

use scraper::Html;
use url::Url;

use crate::core::config::SiteConfig;
use crate::core::error::{CrawlError, Result};
use crate::core::model::{
    ChapterListingEntry, ChapterNumber, MangaListing, MangaRecord, sort_chapters_ascending,
};
use crate::utils::{strip_query, to_absolute_url};

/// 章节页提取结果
#[derive(Debug, Clone)]
pub struct ChapterExtract {
    pub title: String,
    pub number: ChapterNumber,
    /// 远端图片 URL（已绝对化、已剥除查询串），顺序即页序
    pub image_urls: Vec<String>,
}

/// HTML 提取器
pub struct Extractor {
    base: Url,
    selectors: SiteSelectors,
    site: SiteConfig,
}

impl Extractor {
    /// 按站点配置构建提取器，选择器在此一次性编译
    pub fn new(site: SiteConfig) -> Result<Self> {
        let base = Url::parse(&site.base_url)
            .map_err(|e| CrawlError::Custom(format!("Invalid base_url: {e}")))?;
        let selectors = SiteSelectors::compile(&site.selectors)?;
        Ok(Self {
            base,
            selectors,
            site,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// 提取漫画详情页
    ///
    /// 标题为必需字段：为空视为页面结构不符，整次运行无法继续。
    pub fn manga_detail(&self, html: &str, source_url: &str) -> Result<MangaRecord> {
        let doc = Html::parse_document(html);
        let s = &self.selectors.manga;

        let title = doc
            .select(&s.title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        if title.is_empty() {
            return Err(CrawlError::Extraction(format!(
                "Manga title not found at {source_url}"
            )));
        }

        let description = doc
            .select(&s.description)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let cover_image = doc
            .select(&s.cover)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| to_absolute_url(&self.base, strip_query(src.trim())))
            .unwrap_or_default();

        let status = self.labeled_text(&doc, &s.status, &self.site.selectors.manga.status_label);
        let author = self.labeled_text(&doc, &s.author, &self.site.selectors.manga.author_label);

        let genres = doc
            .select(&s.genres)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();

        Ok(MangaRecord {
            source_url: source_url.to_string(),
            title,
            description,
            cover_image,
            status,
            author,
            genres,
        })
    }

    /// 提取章节页
    ///
    /// 章节号解析顺序：标题前缀匹配 -> URL 标记段 -> 空。
    /// 图片属性按配置优先级取用（懒加载属性先于 src），零图片即硬失败。
    pub fn chapter(&self, html: &str, url: &str) -> Result<ChapterExtract> {
        let doc = Html::parse_document(html);
        let s = &self.selectors.chapter;
        let cfg = &self.site.selectors.chapter;

        let title = doc
            .select(&s.title)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let number = cfg
            .number_prefixes
            .iter()
            .find_map(|prefix| parse_number_after(&title, prefix))
            .or_else(|| parse_number_after(url, &cfg.url_number_marker))
            .map(ChapterNumber::new)
            .unwrap_or_else(|| ChapterNumber::new(""));

        let image_urls: Vec<String> = doc
            .select(&s.images)
            .filter_map(|img| {
                let src = cfg
                    .image_attrs
                    .iter()
                    .find_map(|attr| img.value().attr(attr))
                    .unwrap_or("")
                    .trim();
                if src.is_empty() {
                    return None;
                }
                Some(to_absolute_url(&self.base, strip_query(src)))
            })
            .collect();

        if image_urls.is_empty() {
            return Err(CrawlError::Extraction(format!(
                "No images found in chapter {number} at URL {url}"
            )));
        }

        Ok(ChapterExtract {
            title,
            number,
            image_urls,
        })
    }

    /// 提取章节列表
    ///
    /// 缺少章节号或链接的残缺节点被静默跳过；整个列表为空才是错误。
    /// 返回结果已按数值升序（旧章在前）。
    pub fn chapter_list(&self, html: &str, source_url: &str) -> Result<Vec<ChapterListingEntry>> {
        let doc = Html::parse_document(html);
        let s = &self.selectors.chapter_list;
        let label = &self.site.selectors.chapter_list.number_label;

        let mut entries: Vec<ChapterListingEntry> = doc
            .select(&s.item)
            .filter_map(|item| {
                let link = item.select(&s.link).next()?;
                let href = link.value().attr("href")?;
                if href.is_empty() {
                    return None;
                }

                let title = link.text().collect::<String>().trim().to_string();
                let number = title.replace(label.as_str(), "").trim().to_string();
                if number.is_empty() {
                    return None;
                }

                let upload_date = item
                    .select(&s.date)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .unwrap_or_default();

                Some(ChapterListingEntry {
                    chapter_number: ChapterNumber::new(number),
                    url: to_absolute_url(&self.base, href),
                    upload_date,
                })
            })
            .collect();

        if entries.is_empty() {
            return Err(CrawlError::Extraction(format!(
                "No chapters found at {source_url}"
            )));
        }

        sort_chapters_ascending(&mut entries);
        Ok(entries)
    }

    /// 提取列表页（目录索引）
    ///
    /// 空页不是错误：编排器以空页作为翻页终止信号。
    pub fn listing(&self, html: &str) -> Vec<MangaListing> {
        let doc = Html::parse_document(html);
        let s = &self.selectors.listing;

        doc.select(&s.item)
            .filter_map(|item| {
                let title = item
                    .select(&s.title)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .unwrap_or_default();
                let url = item
                    .select(&s.link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default();

                if title.is_empty() || url.is_empty() {
                    return None;
                }

                let cover_image = item
                    .select(&s.cover)
                    .next()
                    .and_then(|img| img.value().attr("src"))
                    .map(|src| to_absolute_url(&self.base, strip_query(src)))
                    .unwrap_or_default();

                Some(MangaListing {
                    title,
                    url: to_absolute_url(&self.base, url),
                    cover_image,
                })
            })
            .collect()
    }

    /// 构造列表页 URL（页码替换模板）
    pub fn listing_page_url(&self, page: usize) -> String {
        let path = self
            .site
            .selectors
            .listing
            .page_path
            .replace("{page}", &page.to_string());
        to_absolute_url(&self.base, &path)
    }

    fn labeled_text(&self, doc: &Html, selector: &scraper::Selector, label: &str) -> String {
        doc.select(selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .map(|text| text.replace(label, "").trim().to_string())
            .unwrap_or_default()
    }
}

/// 在文本中查找 `prefix` 之后的十进制数（可含一个小数点）
///
/// 大小写不敏感。找不到前缀或前缀后没有数字时返回 None。
fn parse_number_after(text: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }

    let lowered = text.to_lowercase();
    let needle = prefix.to_lowercase();
    let at = lowered.find(&needle)?;
    let rest = &lowered[at + needle.len()..];
    let rest = rest.trim_start();

    let mut number = String::new();
    let mut seen_dot = false;
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else if c == '.' && !seen_dot && !number.is_empty() {
            seen_dot = true;
            number.push(c);
        } else {
            break;
        }
    }

    // 孤立的尾部小数点不属于数字
    if number.ends_with('.') {
        number.pop();
    }

    if number.is_empty() { None } else { Some(number) }
}
