//! 端到端流水线测试：以 tiny_http 伪站点驱动完整摄取链路。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tiny_http::{Header, Response, Server};

use manga_spider::core::config::AppConfig;
use manga_spider::engine::{CrawlScope, Ingestor};
use manga_spider::network::HttpFetcher;
use manga_spider::store::{MangaStore, MemoryStore};
use manga_spider::CrawlError;

type Hits = Arc<Mutex<HashMap<String, usize>>>;

/// 启动伪站点
///
/// `handler(path, hit_count)` 返回 (状态码, Content-Type, 响应体)；
/// hit_count 从 1 起计，便于模拟"先失败后成功"的接口。
fn spawn_site<F>(handler: F) -> (String, Hits)
where
    F: Fn(&str, usize) -> (u16, &'static str, Vec<u8>) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").expect("bind stub server");
    let addr = server.server_addr().to_ip().expect("tcp listener");
    let base = format!("http://{addr}");

    let hits: Hits = Arc::default();
    let recorder = hits.clone();

    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let count = {
                let mut map = recorder.lock();
                let entry = map.entry(path.clone()).or_insert(0);
                *entry += 1;
                *entry
            };

            let (status, content_type, body) = handler(&path, count);
            let header =
                Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap();
            let response = Response::from_data(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    (base, hits)
}

fn detail_page(chapter_count: usize) -> String {
    // 列表按新章在前排布，提取端负责升序重排
    let mut rows = String::new();
    for n in (1..=chapter_count).rev() {
        rows.push_str(&format!(
            r#"<div class="works-chapter-item">
                 <div class="name-chap"><a href="/manga/chap-{n}">Chương {n}</a></div>
                 <div class="time-chap">01/0{n}/2024</div>
               </div>"#
        ));
    }

    format!(
        r#"<html><body>
          <div class="book_detail"><h1>Stub Manga</h1></div>
          <div class="book_avatar"><img src="/img/cover.jpg"></div>
          <div class="book_info">
            <div class="status"><p>Tình trạng Đang Cập Nhật</p></div>
            <div class="author"><p>Tác giả Nguyễn Văn A</p></div>
          </div>
          <div class="list01"><div class="li03"><a>Action</a><a>Drama</a></div></div>
          <div class="detail-content"><p>A stub story.</p></div>
          <div class="list_chapter"><div class="works-chapter-list">{rows}</div></div>
        </body></html>"#
    )
}

fn chapter_page(n: usize) -> String {
    // 第一张图走懒加载属性，第二张走 src，覆盖属性优先级链
    format!(
        r#"<html><body>
          <h1 class="chapter-title">Stub Manga Chapter {n}</h1>
          <div class="page-chapter"><img data-original="/img/chap-{n}/p1.jpg"></div>
          <div class="page-chapter"><img src="/img/chap-{n}/p2.jpg?v=3"></div>
        </body></html>"#
    )
}

const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

fn stub_site(chapter_count: usize, failing_chapter: Option<usize>) -> (String, Hits) {
    spawn_site(move |path, _| {
        if path == "/manga" {
            return (200, "text/html", detail_page(chapter_count).into_bytes());
        }
        if let Some(rest) = path.strip_prefix("/manga/chap-") {
            let n: usize = rest.parse().unwrap();
            if failing_chapter == Some(n) {
                return (500, "text/html", b"boom".to_vec());
            }
            return (200, "text/html", chapter_page(n).into_bytes());
        }
        if path.starts_with("/img/") {
            return (200, "image/jpeg", JPEG_BYTES.to_vec());
        }
        (404, "text/plain", b"not found".to_vec())
    })
}

fn test_config(base_url: &str, cache_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.site.base_url = base_url.to_string();
    config.cache_path = cache_dir.display().to_string();
    config.crawler.max_retries = 2;
    config.crawler.retry_delay_ms = 0;
    config.crawler.batch_pause_ms = 0;
    config.crawler.chapter_pause_ms = 0;
    config.crawler.page_pause_ms = 0;
    config
}

fn ingestor(base_url: &str, cache_dir: &Path, store: Arc<MemoryStore>) -> Ingestor {
    let config = Arc::new(test_config(base_url, cache_dir));
    Ingestor::new(config, store as Arc<dyn MangaStore>).unwrap()
}

#[tokio::test]
async fn full_run_ingests_every_chapter() {
    let (base, _) = stub_site(3, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let run = ingestor(&base, dir.path(), store.clone())
        .ingest_manga(&format!("{base}/manga"), CrawlScope::Full)
        .await
        .unwrap();

    assert_eq!(run.manga.title, "Stub Manga");
    assert_eq!(run.manga.author, "Nguyễn Văn A");
    assert_eq!(run.statistics.success_rate, "100.00%");
    assert_eq!(run.statistics.total_chapters, 3);
    assert_eq!(run.chapters.failed.len(), 0);

    // 旧章在前
    let numbers: Vec<&str> = run
        .chapters
        .successful
        .iter()
        .map(|c| c.number.raw())
        .collect();
    assert_eq!(numbers, vec!["1", "2", "3"]);

    for summary in &run.chapters.successful {
        assert_eq!(summary.image_count, 2);
    }

    // 确定性路径落盘
    let page = dir
        .path()
        .join("stub-manga/chapters/chap-1/001.jpg");
    assert!(page.exists());
    let cover = dir.path().join("stub-manga/cover/cover.jpg");
    assert!(cover.exists());
    assert!(run.manga.cover.ends_with("cover.jpg"));

    assert_eq!(store.manga_count(), 1);
    assert_eq!(store.chapter_count(), 3);
}

#[tokio::test]
async fn failed_chapter_does_not_abort_the_run() {
    let (base, _) = stub_site(5, Some(3));
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let run = ingestor(&base, dir.path(), store.clone())
        .ingest_manga(&format!("{base}/manga"), CrawlScope::Full)
        .await
        .unwrap();

    assert_eq!(run.statistics.successful_chapters, 4);
    assert_eq!(run.statistics.failed_chapters, 1);
    assert_eq!(run.statistics.success_rate, "80.00%");
    assert_eq!(run.chapters.failed[0].number.raw(), "3");
    assert!(run.chapters.failed[0].url.ends_with("/manga/chap-3"));
    assert_eq!(store.chapter_count(), 4);
}

#[tokio::test]
async fn repeated_runs_hit_cache_and_upsert_rows() {
    let (base, hits) = stub_site(2, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let ing = ingestor(&base, dir.path(), store.clone());
    let url = format!("{base}/manga");

    ing.ingest_manga(&url, CrawlScope::Full).await.unwrap();
    ing.ingest_manga(&url, CrawlScope::Full).await.unwrap();

    // 第二轮不产生任何图片请求，也不产生新行
    {
        let map = hits.lock();
        assert_eq!(map["/img/cover.jpg"], 1);
        assert_eq!(map["/img/chap-1/p1.jpg"], 1);
        // 查询串在提取阶段即被剥除
        assert_eq!(map["/img/chap-2/p2.jpg"], 1);
    }
    assert_eq!(store.manga_count(), 1);
    assert_eq!(store.chapter_count(), 2);
}

#[tokio::test]
async fn run_emits_lifecycle_and_image_progress_events() {
    let (base, _) = stub_site(2, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let (sender, receiver) = manga_spider::create_event_channel();

    let ing = ingestor(&base, dir.path(), store).with_events(sender);
    ing.ingest_manga(&format!("{base}/manga"), CrawlScope::Full)
        .await
        .unwrap();
    drop(ing);

    let mut saw_started = false;
    let mut saw_completed = false;
    let mut image_peak = 0;
    while let Some(event) = receiver.try_recv() {
        match event {
            manga_spider::CrawlEvent::RunStarted { title, .. } => {
                assert_eq!(title, "Stub Manga");
                saw_started = true;
            }
            manga_spider::CrawlEvent::ImageProgress { downloaded, total } => {
                assert_eq!(total, 2);
                image_peak = image_peak.max(downloaded);
            }
            manga_spider::CrawlEvent::RunCompleted {
                successful, total, ..
            } => {
                assert_eq!((successful, total), (2, 2));
                saw_completed = true;
            }
            _ => {}
        }
    }

    assert!(saw_started);
    assert!(saw_completed);
    // 每章两张图全部汇报进度
    assert_eq!(image_peak, 2);
}

#[tokio::test]
async fn chapter_scope_narrows_the_run() {
    let (base, _) = stub_site(4, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let run = ingestor(&base, dir.path(), store.clone())
        .ingest_manga(&format!("{base}/manga"), CrawlScope::Chapter("2".into()))
        .await
        .unwrap();

    assert_eq!(run.statistics.total_chapters, 1);
    assert_eq!(run.chapters.successful[0].number.raw(), "2");
    assert_eq!(store.chapter_count(), 1);
}

#[tokio::test]
async fn first_chapter_scope_bootstraps_oldest() {
    let (base, _) = stub_site(4, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let run = ingestor(&base, dir.path(), store)
        .ingest_manga(&format!("{base}/manga"), CrawlScope::FirstChapter)
        .await
        .unwrap();

    assert_eq!(run.statistics.total_chapters, 1);
    assert_eq!(run.chapters.successful[0].number.raw(), "1");
}

#[tokio::test]
async fn non_image_content_type_fails_the_chapter() {
    let (base, _) = spawn_site(|path, _| {
        if path == "/manga" {
            (200, "text/html", detail_page(1).into_bytes())
        } else if path.starts_with("/manga/chap-") {
            (200, "text/html", chapter_page(1).into_bytes())
        } else if path == "/img/cover.jpg" {
            (200, "image/jpeg", JPEG_BYTES.to_vec())
        } else {
            // 图片地址吐 HTML（站点防盗链页），必须按下载失败处理
            (200, "text/html", b"<html>hotlink denied</html>".to_vec())
        }
    });
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let run = ingestor(&base, dir.path(), store.clone())
        .ingest_manga(&format!("{base}/manga"), CrawlScope::Full)
        .await
        .unwrap();

    assert_eq!(run.statistics.failed_chapters, 1);
    assert_eq!(run.statistics.successful_chapters, 0);
    assert_eq!(store.chapter_count(), 0);
}

#[tokio::test]
async fn fetcher_retries_until_success() {
    let (base, hits) = spawn_site(|path, count| {
        if path == "/flaky" && count < 3 {
            (500, "text/plain", b"try again".to_vec())
        } else {
            (200, "text/html", b"<html>ok</html>".to_vec())
        }
    });

    let mut config = AppConfig::default();
    config.site.base_url = base.clone();
    config.crawler.max_retries = 3;
    config.crawler.retry_delay_ms = 0;

    let fetcher = HttpFetcher::new(&config).unwrap();
    let body = fetcher.get_text(&format!("{base}/flaky")).await.unwrap();

    assert!(body.contains("ok"));
    assert_eq!(hits.lock()["/flaky"], 3);
}

#[tokio::test]
async fn fetcher_exhausts_attempts_then_reports() {
    let (base, hits) = spawn_site(|_, _| (500, "text/plain", b"nope".to_vec()));

    let mut config = AppConfig::default();
    config.site.base_url = base.clone();
    config.crawler.max_retries = 3;
    config.crawler.retry_delay_ms = 0;

    let fetcher = HttpFetcher::new(&config).unwrap();
    let err = fetcher
        .get_text(&format!("{base}/always-down"))
        .await
        .unwrap_err();

    match err {
        CrawlError::Fetch { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(hits.lock()["/always-down"], 3);
}

#[tokio::test]
async fn update_chapter_requires_existing_manga() {
    let (base, _) = stub_site(1, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let err = ingestor(&base, dir.path(), store)
        .update_chapter(42, &format!("{base}/manga/chap-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Persistence(_)));
}

#[tokio::test]
async fn update_chapter_refreshes_existing_row() {
    let (base, _) = stub_site(2, None);
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let ing = ingestor(&base, dir.path(), store.clone());

    let run = ing
        .ingest_manga(&format!("{base}/manga"), CrawlScope::Full)
        .await
        .unwrap();

    let chapter = ing
        .update_chapter(run.manga.id, &format!("{base}/manga/chap-2"))
        .await
        .unwrap();

    assert_eq!(chapter.record.chapter_number.raw(), "2");
    assert_eq!(chapter.record.images.len(), 2);
    // 同章节号复用原行
    assert_eq!(store.chapter_count(), 2);
}

#[tokio::test]
async fn failed_listing_page_does_not_end_pagination() {
    let (base, _) = spawn_site(|path, _| {
        if path.starts_with("/danh-sach") {
            let page: usize = path
                .rsplit_once("page=")
                .and_then(|(_, p)| p.parse().ok())
                .unwrap_or(1);
            return match page {
                1 => (500, "text/plain", b"upstream down".to_vec()),
                2 => (
                    200,
                    "text/html",
                    br#"<html><body><div class="list-story">
                        <div class="story-item">
                          <a href="/manga"><div class="story-name">Stub Manga</div>
                          <img src="/img/cover.jpg"></a>
                        </div>
                      </div></body></html>"#
                        .to_vec(),
                ),
                _ => (200, "text/html", b"<html><body></body></html>".to_vec()),
            };
        }
        (404, "text/plain", b"not found".to_vec())
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let listings = ingestor(&base, dir.path(), store)
        .crawl_listing_pages(3)
        .await
        .unwrap();

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].title, "Stub Manga");
}

#[tokio::test]
async fn catalog_ingest_walks_listing_pages() {
    let (base, _) = spawn_site(|path, _| {
        if path.starts_with("/danh-sach") {
            let page: usize = path
                .rsplit_once("page=")
                .and_then(|(_, p)| p.parse().ok())
                .unwrap_or(1);
            if page == 1 {
                return (
                    200,
                    "text/html",
                    br#"<html><body><div class="list-story">
                        <div class="story-item">
                          <a href="/manga"><h3 class="story-name">Stub Manga</h3>
                          <img src="/img/cover.jpg"></a>
                        </div>
                      </div></body></html>"#
                        .to_vec(),
                );
            }
            // 第二页为空，翻页应在此停止
            return (200, "text/html", b"<html><body></body></html>".to_vec());
        }
        if path == "/manga" {
            return (200, "text/html", detail_page(2).into_bytes());
        }
        if path.starts_with("/manga/chap-") {
            return (200, "text/html", chapter_page(1).into_bytes());
        }
        if path.starts_with("/img/") {
            return (200, "image/jpeg", JPEG_BYTES.to_vec());
        }
        (404, "text/plain", b"not found".to_vec())
    });

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());

    let runs = ingestor(&base, dir.path(), store.clone())
        .ingest_catalog(false)
        .await
        .unwrap();

    assert_eq!(runs.len(), 1);
    // 非 full 模式只引导最旧一章
    assert_eq!(runs[0].statistics.total_chapters, 1);
    assert_eq!(store.manga_count(), 1);
    assert_eq!(store.chapter_count(), 1);
}
