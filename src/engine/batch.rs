//! 批处理器 (Batch Processor)
//!
//! 以受限并发分批执行一组工作项：同批内并发、批间停顿，
//! 单项失败被捕获并记录，永不中断整批。结果序列保持输入顺序
//! （`join_all` 保序），需要严格顺序的调用方无需额外重排。

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::error::{CrawlError, Result};

/// 批次参数
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 同批并发上限
    pub concurrency: usize,
    /// 批间停顿（避免压垮远端主机）
    pub pause: Duration,
}

impl BatchOptions {
    pub fn new(concurrency: usize, pause_ms: u64) -> Self {
        Self {
            concurrency: concurrency.max(1),
            pause: Duration::from_millis(pause_ms),
        }
    }
}

/// 分批执行工作项
///
/// 取消令牌只在批次边界生效：已在途的批次运行完毕，
/// 未开始的工作项以 `Cancelled` 记入结果，不留半写状态。
pub async fn process_batch<I, T, F, Fut>(
    items: Vec<I>,
    options: &BatchOptions,
    shutdown: &CancellationToken,
    worker: F,
) -> Vec<Result<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = items.len();
    let mut results: Vec<Result<T>> = Vec::with_capacity(total);
    let mut iter = items.into_iter();
    let mut processed = 0;

    while processed < total {
        if shutdown.is_cancelled() {
            debug!("批处理在边界处取消，剩余 {} 项未执行", total - processed);
            results.extend((processed..total).map(|_| Err(CrawlError::Cancelled)));
            break;
        }

        let chunk: Vec<I> = iter.by_ref().take(options.concurrency).collect();
        let chunk_len = chunk.len();

        let chunk_results = join_all(chunk.into_iter().map(&worker)).await;
        for (offset, result) in chunk_results.into_iter().enumerate() {
            if let Err(ref e) = result {
                warn!("批处理第 {} 项失败: {}", processed + offset + 1, e);
            }
            results.push(result);
        }

        processed += chunk_len;
        if processed < total && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn preserves_input_order_and_isolates_failures() {
        let options = BatchOptions::new(2, 0);
        let token = CancellationToken::new();

        let results = process_batch(vec![1, 2, 3, 4, 5], &options, &token, |n| async move {
            if n == 3 {
                Err(CrawlError::Custom("boom".into()))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results.len(), 5);
        assert_eq!(*results[0].as_ref().unwrap(), 10);
        assert_eq!(*results[1].as_ref().unwrap(), 20);
        assert!(results[2].is_err());
        assert_eq!(*results[3].as_ref().unwrap(), 40);
        assert_eq!(*results[4].as_ref().unwrap(), 50);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let options = BatchOptions::new(2, 0);
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let _ = process_batch(vec![(); 7], &options, &token, |_| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancellation_marks_remaining_items() {
        let options = BatchOptions::new(1, 0);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let results = process_batch(vec![1, 2, 3], &options, &token, |n| {
            let counter = counter.clone();
            let token = token.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    token.cancel();
                }
                Ok(n)
            }
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CrawlError::Cancelled)));
        assert!(matches!(results[2], Err(CrawlError::Cancelled)));
    }
}
