use std::path::Path;

use tokio::fs;
use url::Url;

/// 将 href 解析为绝对 URL
///
/// 协议相对路径（`//host/...`）继承基准 URL 的协议。
pub fn to_absolute_url(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }

    if let Some(path_without_slashes) = href.strip_prefix("//") {
        return format!("{}://{}", base.scheme(), path_without_slashes);
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// 剥除 URL 的查询串（缓存穿透参数等）
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// 标题 slug 化
///
/// 小写、剥除变音符号、非字母数字折叠为单个连字符、去除首尾连字符。
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_hyphen = true; // 抑制开头的连字符

    for c in title.chars() {
        let folded = if c.is_ascii() {
            None
        } else {
            Some(fold_diacritic(c))
        };

        match folded {
            Some(ascii) if !ascii.is_empty() => {
                for fc in ascii.chars() {
                    slug.push(fc);
                    last_hyphen = false;
                }
            }
            _ => {
                let lower = c.to_ascii_lowercase();
                if lower.is_ascii_alphanumeric() {
                    slug.push(lower);
                    last_hyphen = false;
                } else if !last_hyphen {
                    slug.push('-');
                    last_hyphen = true;
                }
            }
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// 常见拉丁变音字符折叠为 ASCII（覆盖越南语全部声调形）
fn fold_diacritic(c: char) -> &'static str {
    match c {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' | 'À' | 'Á' | 'Ả' | 'Ã' | 'Ạ' | 'Ă' | 'Ằ' | 'Ắ' | 'Ẳ' | 'Ẵ'
        | 'Ặ' | 'Â' | 'Ầ' | 'Ấ' | 'Ẩ' | 'Ẫ' | 'Ậ' | 'ä' | 'Ä' | 'å' | 'Å' => "a",
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' | 'È' | 'É' | 'Ẻ'
        | 'Ẽ' | 'Ẹ' | 'Ê' | 'Ề' | 'Ế' | 'Ể' | 'Ễ' | 'Ệ' | 'ë' | 'Ë' => "e",
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' | 'Ì' | 'Í' | 'Ỉ' | 'Ĩ' | 'Ị' | 'ï' | 'Ï' => "i",
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' | 'Ò' | 'Ó' | 'Ỏ' | 'Õ' | 'Ọ' | 'Ô' | 'Ồ' | 'Ố' | 'Ổ' | 'Ỗ'
        | 'Ộ' | 'Ơ' | 'Ờ' | 'Ớ' | 'Ở' | 'Ỡ' | 'Ợ' | 'ö' | 'Ö' => "o",
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' | 'Ù' | 'Ú' | 'Ủ'
        | 'Ũ' | 'Ụ' | 'Ư' | 'Ừ' | 'Ứ' | 'Ử' | 'Ữ' | 'Ự' | 'ü' | 'Ü' => "u",
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' | 'Ỳ' | 'Ý' | 'Ỷ' | 'Ỹ' | 'Ỵ' => "y",
        'đ' | 'Đ' => "d",
        'ç' | 'Ç' => "c",
        'ñ' | 'Ñ' => "n",
        // 表外字符交回调用方按非字母数字处理
        _ => "",
    }
}

pub async fn file_exists(path: impl AsRef<Path>) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub async fn save_file(path: impl AsRef<Path>, data: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    Ok(())
}
