//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及系统生命周期管理。

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use manga_spider::core::config::AppConfig;
use manga_spider::core::event::create_event_channel;
use manga_spider::core::model::ChapterNumber;
use manga_spider::engine::{CrawlScope, Ingestor};
use manga_spider::store::{JsonStore, MangaStore};
use manga_spider::ui::{self, Ui};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（缺省时走内置默认值 + 环境变量覆盖）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 抓取一部漫画及其章节
    Crawl {
        /// 漫画详情页 URL
        #[arg(short, long)]
        url: String,
        /// 只抓指定章节号
        #[arg(long, conflicts_with = "first_only")]
        chapter: Option<String>,
        /// 只抓最旧一章（新漫画引导）
        #[arg(long)]
        first_only: bool,
    },
    /// 抓取并更新单个章节
    Chapter {
        /// 目标漫画 id
        #[arg(short, long)]
        manga_id: u64,
        /// 章节页 URL
        #[arg(short, long)]
        url: String,
    },
    /// 翻页抓取列表页并批量摄取
    Catalog {
        /// 最大翻页数（缺省取配置值）
        #[arg(long)]
        max_pages: Option<usize>,
        /// 每部漫画抓全部章节（缺省只引导最旧一章）
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(ui::log_writer())
        .with_target(false)
        .with_ansi(true)
        .init();

    // 依赖项初始化与注入 (Dependency Injection)
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    if let Commands::Catalog {
        max_pages: Some(pages),
        ..
    } = &cli.command
    {
        config.crawler.max_listing_pages = *pages;
    }

    let config = Arc::new(config);
    let catalog_path = PathBuf::from(&config.cache_path).join("catalog.json");
    let store: Arc<dyn MangaStore> = Arc::new(JsonStore::open(catalog_path).await?);

    // 信号处理与优雅退出 (Signal Handling)
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("收到中断信号，将在批次边界停止");
                shutdown.cancel();
            }
        });
    }

    let (event_sender, event_receiver) = create_event_channel();
    let ui_handle = Ui::run(event_receiver);

    let ingestor = Ingestor::new(config.clone(), store)?
        .with_events(event_sender)
        .with_shutdown(shutdown);

    match cli.command {
        Commands::Crawl {
            url,
            chapter,
            first_only,
        } => {
            let scope = match chapter {
                Some(number) => CrawlScope::Chapter(ChapterNumber::new(number)),
                None if first_only => CrawlScope::FirstChapter,
                None => CrawlScope::Full,
            };

            let run = ingestor.ingest_manga(&url, scope).await?;
            drop(ingestor);
            let _ = ui_handle.await;
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        Commands::Chapter { manga_id, url } => {
            let chapter = ingestor.update_chapter(manga_id, &url).await?;
            drop(ingestor);
            let _ = ui_handle.await;
            println!("{}", serde_json::to_string_pretty(&chapter)?);
        }
        Commands::Catalog { full, .. } => {
            let runs = ingestor.ingest_catalog(full).await?;
            drop(ingestor);
            let _ = ui_handle.await;
            tracing::info!("目录摄取完成，共 {} 部漫画", runs.len());
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
    }

    Ok(())
}
