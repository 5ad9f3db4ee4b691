//! 基础设施层（Infrastructure）
//!
//! 持有外部资源（存储、任务队列、工作池），只暴露原语能力，不认识识别/生成流程。

pub mod dispatch;
pub mod store;
pub mod worker_pool;

pub use dispatch::{ChannelDispatcher, Dispatcher, RecordingDispatcher, Task, TaskDescriptor, TaskHandler};
pub use store::{DocumentStore, InMemoryStore, JobStore};
pub use worker_pool::{PoolSettings, PoolStatsSnapshot, WorkerPool};
