//! HTTP 抓取器 (HTTP Fetcher)
//!
//! 执行带固定间隔重试的 GET 请求，注入伪装浏览器的请求头。
//! 重试策略刻意保持简单：任何传输错误或非 2xx 状态都以同样方式
//! 重试至次数上限，无抖动、无指数退避——与既有行为兼容，
//! 时序参数全部来自配置。

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT,
};
use tracing::warn;

use crate::core::config::AppConfig;
use crate::core::error::{CrawlError, Result};

/// 浏览器伪装请求头中的静态部分
const SEC_HEADERS: [(&str, &str); 4] = [
    (
        "sec-ch-ua",
        "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("upgrade-insecure-requests", "1"),
];

/// HTTP 抓取器
///
/// 从调用方视角是纯函数：除网络调用外无副作用。
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// 按配置构建抓取器
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        if let Ok(ua) = HeaderValue::from_str(&config.site.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        if let Ok(referer) = HeaderValue::from_str(&config.site.base_url) {
            headers.insert(REFERER, referer);
        }
        for (name, value) in SEC_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
            .build()
            .map_err(CrawlError::Network)?;

        Ok(Self {
            client,
            max_retries: config.crawler.max_retries.max(1),
            retry_delay: Duration::from_millis(config.crawler.retry_delay_ms),
        })
    }

    /// 执行带重试的 GET
    ///
    /// 最后一次尝试的失败不再等待，直接向上传播。
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_reason = String::new();

        for attempt in 1..=self.max_retries {
            match self.try_get(url).await {
                Ok(resp) => return Ok(resp),
                Err(reason) => {
                    if attempt == self.max_retries {
                        return Err(CrawlError::Fetch {
                            url: url.to_string(),
                            attempts: attempt,
                            reason,
                        });
                    }
                    warn!(
                        "请求失败 (第 {}/{} 次): {} - {}，{:?} 后重试",
                        attempt, self.max_retries, url, reason, self.retry_delay
                    );
                    last_reason = reason;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        // max_retries >= 1，循环必然已返回
        Err(CrawlError::Fetch {
            url: url.to_string(),
            attempts: self.max_retries,
            reason: last_reason,
        })
    }

    async fn try_get(&self, url: &str) -> std::result::Result<reqwest::Response, String> {
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    Ok(resp)
                } else {
                    Err(format!("HTTP {}", status))
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// 获取文本内容
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self.get(url).await?;
        resp.text().await.map_err(CrawlError::Network)
    }

    /// 获取二进制内容及其 Content-Type
    pub async fn get_bytes(&self, url: &str) -> Result<(Bytes, Option<String>)> {
        let resp = self.get(url).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp.bytes().await.map_err(CrawlError::Network)?;
        Ok((bytes, content_type))
    }
}
