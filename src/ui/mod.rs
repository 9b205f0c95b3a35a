//! 终端进度渲染 (Terminal UI Progress)
//!
//! 基于 `indicatif` 将编排器事件渲染为进度条。日志通过
//! [`log_writer`] 经由 `MultiProgress` 输出，避免与进度条互相覆盖。

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::core::event::{CrawlEvent, EventReceiver};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// 为 `tracing-subscriber` 提供的写入器：日志行经进度容器打印
pub fn log_writer() -> impl Fn() -> ProgressWriter {
    || ProgressWriter
}

pub struct ProgressWriter;

impl io::Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf);
        get_multi().suspend(|| eprint!("{line}"));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// TUI 状态容器
struct UiState {
    /// 运行主状态条
    main_bar: Option<ProgressBar>,
    /// 章节进度条
    chapter_bar: Option<ProgressBar>,
}

impl UiState {
    fn new() -> Self {
        Self {
            main_bar: None,
            chapter_bar: None,
        }
    }
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::new())))
}

/// 进度协调器
pub struct Ui;

impl Ui {
    /// 激活事件监听循环，启动异步渲染
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    /// 执行 UI 状态转换与渲染更新
    fn handle_event(event: CrawlEvent) {
        let multi = get_multi();
        let state = get_state();
        let mut ui = state.write();

        match event {
            CrawlEvent::RunStarted { title, .. } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style);
                bar.set_message(format!("📚 {}", title));
                bar.enable_steady_tick(Duration::from_millis(100));
                ui.main_bar = Some(bar);
            }
            CrawlEvent::ChaptersDiscovered { total } => {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("█▉▊▋▌▍▎▏  ");

                let bar = multi.add(ProgressBar::new(total as u64));
                bar.set_style(style);
                ui.chapter_bar = Some(bar);
            }
            CrawlEvent::ChapterProgress {
                current, number, ..
            } => {
                if let Some(ref bar) = ui.chapter_bar {
                    bar.set_position(current as u64);
                    bar.set_message(format!("章节 {}", number));
                }
            }
            CrawlEvent::ChapterFailed { number, .. } => {
                if let Some(ref bar) = ui.chapter_bar {
                    bar.set_message(format!("⚠️ 章节 {} 失败", number));
                }
            }
            CrawlEvent::CoverCached { .. } => {
                if let Some(ref bar) = ui.main_bar {
                    bar.set_message("🖼️ 封面已缓存");
                }
            }
            CrawlEvent::RunCompleted {
                successful, total, ..
            } => {
                if let Some(ref bar) = ui.chapter_bar.take() {
                    bar.finish_with_message(format!("✅ {}/{} 章节完成", successful, total));
                }
                if let Some(ref bar) = ui.main_bar.take() {
                    bar.finish_with_message("✅ 运行结束");
                }
            }
            CrawlEvent::RunFailed { error } => {
                if let Some(ref bar) = ui.main_bar.take() {
                    bar.abandon_with_message(format!("❌ 运行失败: {}", error));
                }
            }
            _ => {}
        }
    }
}
