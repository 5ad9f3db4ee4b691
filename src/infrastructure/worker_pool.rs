//! 工作池
//!
//! ## 职责
//!
//! 1. **消费任务**：从 `ChannelDispatcher` 的接收端取任务
//! 2. **并发控制**：使用 Semaphore 限制同时执行的任务数
//! 3. **超时与重投**：超时或可重试错误时重新投递，直到达到最大投递次数
//! 4. **统计**：记录执行、成功、重投、放弃的数量

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::dispatch::{ChannelDispatcher, Dispatcher, TaskDescriptor, TaskHandler};
use crate::config::Config;

/// 工作池统计
#[derive(Debug, Default)]
pub struct PoolStats {
    executed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    redelivered: AtomicUsize,
    abandoned: AtomicUsize,
}

/// 统计快照
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub redelivered: usize,
    pub abandoned: usize,
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            executed: self.executed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// 工作池设置
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_concurrent: usize,
    pub max_attempts: u32,
    pub task_timeout: Duration,
    pub redelivery_backoff: Duration,
}

impl From<&Config> for PoolSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent: config.max_concurrent_units,
            max_attempts: config.max_delivery_attempts,
            task_timeout: Duration::from_secs(config.unit_timeout_secs),
            redelivery_backoff: Duration::from_millis(config.redelivery_backoff_ms),
        }
    }
}

/// 正在运行的工作池
pub struct WorkerPool {
    join: JoinHandle<()>,
    shutdown: Arc<Notify>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// 启动工作池
    ///
    /// `redeliver` 必须是与 `receiver` 同一通道的发送端，重投的任务会回到队列末尾。
    pub fn spawn(
        handler: Arc<dyn TaskHandler>,
        redeliver: ChannelDispatcher,
        mut receiver: mpsc::UnboundedReceiver<TaskDescriptor>,
        settings: PoolSettings,
    ) -> Self {
        let shutdown = Arc::new(Notify::new());
        let stats = Arc::new(PoolStats::default());
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));

        let loop_shutdown = shutdown.clone();
        let loop_stats = stats.clone();
        let join = tokio::spawn(async move {
            info!("🚀 工作池启动，最大并发数: {}", settings.max_concurrent);
            loop {
                let task = tokio::select! {
                    _ = loop_shutdown.notified() => break,
                    task = receiver.recv() => match task {
                        Some(task) => task,
                        None => break,
                    },
                };

                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let handler = handler.clone();
                let redeliver = redeliver.clone();
                let settings = settings.clone();
                let stats = loop_stats.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_task(handler.as_ref(), &redeliver, task, &settings, &stats).await;
                });
            }
            info!("工作池已停止");
        });

        Self {
            join,
            shutdown,
            stats,
        }
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }

    /// 停止接收新任务；已经开始执行的任务会继续跑完
    pub async fn shutdown(self) -> PoolStatsSnapshot {
        self.shutdown.notify_one();
        if let Err(e) = self.join.await {
            error!("工作池主循环异常退出: {}", e);
        }
        self.stats.snapshot()
    }
}

/// 执行单个任务，必要时重投
async fn run_task(
    handler: &dyn TaskHandler,
    redeliver: &ChannelDispatcher,
    task: TaskDescriptor,
    settings: &PoolSettings,
    stats: &PoolStats,
) {
    let label = task.label();
    debug!("开始执行 {}", label);
    stats.executed.fetch_add(1, Ordering::Relaxed);

    let should_redeliver = match tokio::time::timeout(settings.task_timeout, handler.handle(&task)).await {
        Ok(Ok(())) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            false
        }
        Ok(Err(e)) if e.is_retryable() => {
            warn!("⚠️ {} 执行失败，可重试: {}", label, e);
            true
        }
        Ok(Err(e)) => {
            error!("❌ {} 执行失败，不再重试: {}", label, e);
            stats.failed.fetch_add(1, Ordering::Relaxed);
            false
        }
        Err(_) => {
            warn!("⏱️ {} 执行超时 ({:?})", label, settings.task_timeout);
            true
        }
    };

    if !should_redeliver {
        return;
    }

    if task.attempt >= settings.max_attempts {
        error!("❌ {} 已达到最大投递次数 {}，放弃", label, settings.max_attempts);
        stats.abandoned.fetch_add(1, Ordering::Relaxed);
        return;
    }

    tokio::time::sleep(settings.redelivery_backoff).await;
    match redeliver.dispatch(task.redelivery()).await {
        Ok(()) => {
            stats.redelivered.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!("❌ {} 重新投递失败: {}", label, e);
            stats.abandoned.fetch_add(1, Ordering::Relaxed);
        }
    }
}
