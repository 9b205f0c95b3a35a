//! 错误处理体系 (Error Handling System)
//!
//! 定义抓取领域的错误分类以及全局 Result 别名。
//! 传播策略：章节级/图片级失败被捕获并记入失败清单，
//! 漫画身份建立阶段（详情页、章节列表）的失败则终止整次运行。

use thiserror::Error;

/// 全局错误定义 (Crawl Domain Errors)
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 重试耗尽后的网络失败（含超时与非 2xx 状态码）
    #[error("Fetch failed after {attempts} attempts: {url} ({reason})")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 必需字段提取为空（如章节图片为零、列表整页为空）
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// 图片下载失败或响应不是图片类型
    #[error("Download error: {0}")]
    Download(String),

    /// 持久化网关操作失败
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// 选择器字符串无法编译（配置期错误）
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    /// 运行在批次边界被取消
    #[error("Run cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Custom(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, CrawlError>;
