//! 资产缓存 (Asset Cache)
//!
//! 将远端图片下载到内容寻址的本地路径。寻址由确定性路径而非哈希承担：
//! 同一 (漫画, 章节, 序号) 永远落到同一文件，并发写入天然无冲突，
//! 已存在的文件直接命中、不再发起网络请求。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::error::{CrawlError, Result};
use crate::core::model::ChapterNumber;
use crate::network::HttpFetcher;
use crate::utils::{file_exists, save_file, slugify, strip_query};

/// 图片后处理钩子
///
/// 运行期可替换的变换步骤（压缩 / 转码等）。失败时调用方回退到原始字节。
pub trait ImageTransform: Send + Sync {
    fn transform(&self, bytes: Bytes) -> Result<Bytes>;
}

/// 恒等变换（默认实现）
pub struct IdentityTransform;

impl ImageTransform for IdentityTransform {
    fn transform(&self, bytes: Bytes) -> Result<Bytes> {
        Ok(bytes)
    }
}

/// 资产缓存
pub struct AssetCache {
    root: PathBuf,
    fetcher: HttpFetcher,
    transform: Arc<dyn ImageTransform>,
}

impl AssetCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: HttpFetcher) -> Self {
        Self {
            root: root.into(),
            fetcher,
            transform: Arc::new(IdentityTransform),
        }
    }

    /// 注入后处理变换
    pub fn with_transform(mut self, transform: Arc<dyn ImageTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// 确保远端图片在本地可用，返回本地路径
    ///
    /// 路径已存在时直接返回，不触网。响应的 Content-Type 必须以
    /// `image/` 开头，否则即便 2xx 也按下载失败处理。
    pub async fn ensure_local(
        &self,
        remote_url: &str,
        manga_title: &str,
        chapter_number: Option<&ChapterNumber>,
        image_index: Option<usize>,
        is_cover: bool,
    ) -> Result<PathBuf> {
        let path = self.local_path_for(remote_url, manga_title, chapter_number, image_index, is_cover);

        if file_exists(&path).await {
            debug!("缓存命中: {}", path.display());
            return Ok(path);
        }

        let (bytes, content_type) = self.fetcher.get_bytes(remote_url).await.map_err(|e| {
            CrawlError::Download(format!("Image fetch failed for {remote_url}: {e}"))
        })?;

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => {}
            other => {
                return Err(CrawlError::Download(format!(
                    "Invalid image response for {remote_url}: content-type {:?}",
                    other.unwrap_or("missing")
                )));
            }
        }

        let bytes = match self.transform.transform(bytes.clone()) {
            Ok(out) => out,
            Err(e) => {
                warn!("图片变换失败，回退原始字节: {}", e);
                bytes
            }
        };

        save_file(&path, &bytes).await?;
        Ok(path)
    }

    /// 缓存封面
    pub async fn ensure_cover(&self, remote_url: &str, manga_title: &str) -> Result<PathBuf> {
        self.ensure_local(remote_url, manga_title, None, None, true)
            .await
    }

    /// 缓存章节页图片（index 为 0 基，文件名转为 1 基三位序号）
    pub async fn ensure_page(
        &self,
        remote_url: &str,
        manga_title: &str,
        chapter_number: &ChapterNumber,
        image_index: usize,
    ) -> Result<PathBuf> {
        self.ensure_local(
            remote_url,
            manga_title,
            Some(chapter_number),
            Some(image_index),
            false,
        )
        .await
    }

    /// 推导确定性本地路径（纯函数，不触网）
    pub fn local_path_for(
        &self,
        remote_url: &str,
        manga_title: &str,
        chapter_number: Option<&ChapterNumber>,
        image_index: Option<usize>,
        is_cover: bool,
    ) -> PathBuf {
        let manga_dir = self.root.join(slugify(manga_title));

        match (is_cover, chapter_number, image_index) {
            (false, Some(number), Some(index)) => {
                let filename = format!("{:03}.{}", index + 1, image_extension(remote_url));
                manga_dir
                    .join("chapters")
                    .join(format!("chap-{}", number.normalized()))
                    .join(filename)
            }
            // 封面固定为 jpg，缺少章节定位信息的图片也按封面处理
            _ => manga_dir.join("cover").join("cover.jpg"),
        }
    }
}

/// 由 URL 推导图片扩展名
///
/// 扩展名必须能映射到 image/* MIME 类型，否则回退 jpg
/// （来源站点偶见 .php 出图地址）。
fn image_extension(url: &str) -> String {
    let ext = Path::new(strip_query(url))
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match ext {
        Some(ext) => {
            let is_image = mime_guess::from_ext(&ext)
                .first()
                .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
                .unwrap_or(false);
            if is_image { ext } else { "jpg".to_string() }
        }
        None => "jpg".to_string(),
    }
}
