//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责作业的创建、扇出与阶段推进，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `fan_out` - 扇出投递器
//! - 创建作业记录，一次性写入全部 pending 单元
//! - 每个单元投递一个独立任务
//!
//! ### `coordinator` - 流水线协调器
//! - 管理文档的识别 / 抽取两段状态
//! - 作为任务入口，把单元任务交给 `UnitWorker`，抽取任务自己执行
//! - 作业到齐后的阶段切换（识别 → 抽取、生成作业收尾）
//! - 进度查询与新试卷组装
//!
//! ### `app` - 应用驱动
//! - 组装存储、工作池和服务
//! - 跑完一次“上传 → 识别 → 抽取 → 出题 → 导出”
//!
//! ## 层次关系
//!
//! ```text
//! app (一次完整运行)
//!     ↓
//! coordinator (文档状态机 + 任务入口)
//!     ↓
//! fan_out (作业 → N 个单元任务)
//!     ↓
//! workflow::UnitWorker (处理单个单元) → StageGate → ProgressCounter
//!     ↓
//! services (能力层：ocr / extract / generation / export / warn)
//!     ↓
//! infrastructure (基础设施：store / dispatch / worker_pool)
//! ```

pub mod app;
pub mod coordinator;
pub mod fan_out;

// 重新导出主要类型
pub use app::App;
pub use coordinator::{PipelineCoordinator, PipelineServices};
pub use fan_out::FanOutDispatcher;
