//! # Exam Pipeline
//!
//! 试卷识别与出题流水线：逐页识别 → 结构化抽取 → 按选中题目生成新试卷
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/store` - 作业 / 单元 / 文档存储，提供原子自增与条件更新
//! - `infrastructure/dispatch` - 至少一次的任务投递
//! - `infrastructure/worker_pool` - 并发执行任务，超时或可重试错误时重投
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，一次只处理一页或一道题
//! - `OcrService` - 页面识别能力
//! - `ExtractService` - 试卷结构抽取能力
//! - `GenerationService` - 按题型出新题能力
//! - `ExportService` / `WarnWriter` - 导出与写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个单元"的完整处理流程
//! - `UnitWorker` - 计算 → 条件写入 → 计数 → 完成回调
//! - `StageGate` / `ProgressCounter` - 汇总与只执行一次的阶段切换
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/fan_out` - 创建作业并扇出
//! - `orchestrator/coordinator` - 文档状态机与任务入口
//! - `orchestrator/app` - 应用驱动
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{InMemoryStore, WorkerPool};
pub use models::{JobId, JobProgress, Status, UnitResult};
pub use orchestrator::{App, FanOutDispatcher, PipelineCoordinator, PipelineServices};
pub use workflow::{ProgressCounter, StageGate, TransitionDecision, UnitCtx, UnitWorker};
