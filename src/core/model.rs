//! 领域模型 (Domain Model)
//!
//! 漫画 / 章节记录、瞬态的列表条目以及单次运行的汇总结构。

use serde::{Deserialize, Serialize};

/// 漫画记录
///
/// `source_url` 是自然键：持久化网关先按它查找再决定插入或更新，
/// 同一来源 URL 永远只存在一行。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaRecord {
    pub source_url: String,
    pub title: String,
    pub description: String,
    /// 封面：缓存后的本地路径，缓存前为远端 URL
    pub cover_image: String,
    pub status: String,
    pub author: String,
    pub genres: Vec<String>,
}

/// 章节记录
///
/// `images` 为缓存完成后的本地路径序列，持久化前必须非空。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub manga_id: u64,
    pub chapter_number: ChapterNumber,
    pub title: String,
    pub source_url: String,
    pub images: Vec<String>,
}

/// 章节号
///
/// 来源站点存在 "10.5" 这类小数章节号，排序必须按数值而非字典序。
/// 原始字符串保留用于展示，目录命名使用 `normalized()`（剥除 ".0" 尾缀）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterNumber(String);

impl ChapterNumber {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// 原始文本形式
    pub fn raw(&self) -> &str {
        &self.0
    }

    /// 数值形式，用于排序；无法解析时归零
    pub fn value(&self) -> f64 {
        self.0.parse().unwrap_or(0.0)
    }

    /// 规范化形式："3.0" -> "3"，"3.5" 保持不变
    pub fn normalized(&self) -> String {
        if let Some(dot) = self.0.find('.') {
            let frac = &self.0[dot + 1..];
            if !frac.is_empty() && frac.bytes().all(|b| b == b'0') {
                return self.0[..dot].to_string();
            }
        }
        self.0.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for ChapterNumber {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for ChapterNumber {}

impl std::hash::Hash for ChapterNumber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl std::fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChapterNumber {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// 章节列表条目（瞬态）
///
/// 由章节列表提取产生，随即被编排器消费，不落库。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterListingEntry {
    pub chapter_number: ChapterNumber,
    pub url: String,
    pub upload_date: String,
}

/// 列表页条目（瞬态）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaListing {
    pub title: String,
    pub url: String,
    pub cover_image: String,
}

/// 单章节成功摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub number: ChapterNumber,
    pub title: String,
    pub image_count: usize,
    pub local_paths: Vec<String>,
}

/// 单章节失败记录
///
/// 携带来源 URL 与原因，便于用窄化范围（单章节号）手工重试失败子集。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterFailure {
    pub number: ChapterNumber,
    pub url: String,
    pub error: String,
}

/// 运行汇总中的漫画快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MangaSnapshot {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub cover: String,
    pub total_chapters: usize,
}

/// 运行统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_chapters: usize,
    pub successful_chapters: usize,
    pub failed_chapters: usize,
    /// 两位小数的成功率；总数为零时为 "N/A"
    pub success_rate: String,
}

/// 运行元信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub source: String,
    pub crawled_at: String,
    pub execution_time: String,
}

/// 章节处理结果清单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterOutcomes {
    pub successful: Vec<ChapterSummary>,
    pub failed: Vec<ChapterFailure>,
}

/// 单次编排运行的汇总（瞬态，归调用方所有）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRunResult {
    pub manga: MangaSnapshot,
    pub statistics: RunStatistics,
    pub chapters: ChapterOutcomes,
    pub metadata: RunMetadata,
}

impl RunStatistics {
    /// 由计数构造统计信息
    pub fn from_counts(total: usize, successful: usize, failed: usize) -> Self {
        let success_rate = if total == 0 {
            "N/A".to_string()
        } else {
            format!("{:.2}%", successful as f64 / total as f64 * 100.0)
        };
        Self {
            total_chapters: total,
            successful_chapters: successful,
            failed_chapters: failed,
            success_rate,
        }
    }
}

/// 按数值升序排列章节列表（旧章在前）
///
/// 部分运行因此总是产出目录的连续前缀。
pub fn sort_chapters_ascending(entries: &mut [ChapterListingEntry]) {
    entries.sort_by(|a, b| {
        a.chapter_number
            .value()
            .partial_cmp(&b.chapter_number.value())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
