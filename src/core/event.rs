//! 事件系统定义
//!
//! 用于编排器与终端 UI 之间的完全解耦通信。

use flume::{Receiver, Sender};

use crate::core::model::ChapterNumber;

/// 抓取事件类型
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// 运行开始
    RunStarted { source_url: String, title: String },

    /// 发现章节总数
    ChaptersDiscovered { total: usize },

    /// 章节处理进度
    ChapterProgress {
        current: usize,
        total: usize,
        number: ChapterNumber,
    },

    /// 章节内图片下载进度
    ImageProgress { downloaded: usize, total: usize },

    /// 单章节完成
    ChapterCompleted {
        number: ChapterNumber,
        image_count: usize,
    },

    /// 单章节失败（非致命，运行继续）
    ChapterFailed {
        number: ChapterNumber,
        error: String,
    },

    /// 封面已缓存
    CoverCached { path: String },

    /// 运行完成（允许存在部分章节失败）
    RunCompleted {
        successful: usize,
        failed: usize,
        total: usize,
    },

    /// 运行致命失败（漫画身份未能建立）
    RunFailed { error: String },
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<CrawlEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<CrawlEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件（接收端关闭时静默丢弃）
    pub fn emit(&self, event: CrawlEvent) {
        let _ = self.tx.send(event);
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<CrawlEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<CrawlEvent>) -> Self {
        Self { rx }
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<CrawlEvent> {
        self.rx.recv_async().await.ok()
    }

    /// 非阻塞接收事件
    pub fn try_recv(&self) -> Option<CrawlEvent> {
        self.rx.try_recv().ok()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
