//! 任务投递
//!
//! 投递语义是“至少一次”：同一个任务可能被执行多次，也可能并发执行。

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::models::{DocumentId, JobId, UnitInput};

/// 任务内容
#[derive(Debug, Clone)]
pub enum Task {
    /// 处理作业中的一个单元
    Unit {
        job_id: JobId,
        unit_index: usize,
        input: UnitInput,
    },
    /// 识别完成后的题目抽取（单个任务，不扇出）
    Extract {
        document_id: DocumentId,
        ocr_job_id: JobId,
    },
}

/// 任务描述：任务内容 + 第几次投递
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub task: Task,
    /// 从 1 开始
    pub attempt: u32,
}

impl TaskDescriptor {
    pub fn new(task: Task) -> Self {
        Self { task, attempt: 1 }
    }

    /// 重新投递时使用的副本
    pub fn redelivery(&self) -> Self {
        Self {
            task: self.task.clone(),
            attempt: self.attempt + 1,
        }
    }

    /// 日志用标签
    pub fn label(&self) -> String {
        match &self.task {
            Task::Unit {
                job_id, unit_index, ..
            } => format!("单元任务 {}#{} (第 {} 次投递)", job_id, unit_index, self.attempt),
            Task::Extract { document_id, .. } => {
                format!("抽取任务 {} (第 {} 次投递)", document_id, self.attempt)
            }
        }
    }
}

/// 投递接口
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, task: TaskDescriptor) -> AppResult<()>;
}

/// 任务执行入口，由工作池调用
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &TaskDescriptor) -> AppResult<()>;
}

/// 基于 tokio 通道的投递器，接收端交给 `WorkerPool`
#[derive(Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<TaskDescriptor>,
}

impl ChannelDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskDescriptor>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Dispatcher for ChannelDispatcher {
    async fn dispatch(&self, task: TaskDescriptor) -> AppResult<()> {
        self.sender
            .send(task)
            .map_err(|e| AppError::Dispatch(format!("工作池已关闭: {}", e.0.label())))
    }
}

/// 只记录、不执行的投递器，测试时手动驱动任务
#[derive(Default)]
pub struct RecordingDispatcher {
    tasks: Mutex<Vec<TaskDescriptor>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出目前记录的全部任务
    pub fn take(&self) -> Vec<TaskDescriptor> {
        match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, task: TaskDescriptor) -> AppResult<()> {
        self.tasks
            .lock()
            .map_err(|_| AppError::Dispatch("记录器锁已损坏".to_string()))?
            .push(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_dispatcher_delivers_in_send_order() {
        let (dispatcher, mut rx) = ChannelDispatcher::channel();
        let doc = DocumentId::new();
        dispatcher
            .dispatch(TaskDescriptor::new(Task::Extract {
                document_id: doc,
                ocr_job_id: JobId::new(),
            }))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.attempt, 1);
        assert!(matches!(received.task, Task::Extract { document_id, .. } if document_id == doc));
    }

    #[tokio::test]
    async fn test_closed_channel_is_dispatch_error() {
        let (dispatcher, rx) = ChannelDispatcher::channel();
        drop(rx);
        let result = dispatcher
            .dispatch(TaskDescriptor::new(Task::Extract {
                document_id: DocumentId::new(),
                ocr_job_id: JobId::new(),
            }))
            .await;
        assert!(matches!(result, Err(AppError::Dispatch(_))));
    }

    #[test]
    fn test_redelivery_bumps_attempt() {
        let task = TaskDescriptor::new(Task::Extract {
            document_id: DocumentId::new(),
            ocr_job_id: JobId::new(),
        });
        assert_eq!(task.redelivery().redelivery().attempt, 3);
    }
}
