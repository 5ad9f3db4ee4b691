//! 单元工作者 - 流程层
//!
//! 核心职责：定义“一个单元”的完整处理流程
//!
//! 流程顺序：
//! 1. 记录一次调用（pending → processing，仅供观察）
//! 2. 执行计算（识别一页 / 生成一道题）
//! 3. 条件写入结果并计数：只有把单元从 pending/processing 改为 done/error 的那次调用有效，
//!    写入与自增在存储的同一步里提交
//! 4. 闸门根据自增后的值判断作业是否到齐
//! 5. 闸门返回 `JustCompleted` 时执行作业完成回调，成功后标记回调已执行
//!
//! 重复投递时第 3 步不会生效，因此计数不会被重复累加。
//! 单元已是终态的投递会补做前一次调用没做完的收尾：作业到齐但状态未切换时补做切换，
//! 作业已完成但回调未标记时补跑回调。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::stage_gate::{StageGate, TransitionDecision};
use super::unit_ctx::UnitCtx;
use crate::error::AppResult;
use crate::infrastructure::JobStore;
use crate::models::{JobId, Status, UnitInput, UnitResult};

/// 单元计算：输入一个单元，输出成功内容或失败信息，不会返回 `Err`
#[async_trait]
pub trait UnitCompute: Send + Sync {
    async fn compute(&self, input: &UnitInput) -> UnitResult;
}

/// 作业完成回调
///
/// 逻辑上只会执行一次，但实现仍需容忍被调用两次。
#[async_trait]
pub trait CompletionCallback: Send + Sync {
    async fn on_job_complete(&self, job_id: JobId) -> AppResult<()>;
}

/// 工作者调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// 本次调用写入了单元结果并计入了作业进度
    Recorded {
        unit_status: Status,
        decision: TransitionDecision,
    },
    /// 该单元已由其他调用完成，本次调用什么也没改
    Duplicate,
    /// 该单元已是终态，本次调用补做了作业的收尾
    Resumed { decision: TransitionDecision },
}

/// 单元工作者
#[derive(Clone)]
pub struct UnitWorker {
    store: Arc<dyn JobStore>,
    gate: StageGate,
}

impl UnitWorker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            gate: StageGate::new(store.clone()),
            store,
        }
    }

    pub async fn process(
        &self,
        ctx: &UnitCtx,
        input: &UnitInput,
        compute: &dyn UnitCompute,
        callback: &dyn CompletionCallback,
    ) -> AppResult<WorkerOutcome> {
        // ========== 1. 记录调用 ==========
        let unit = self.store.record_attempt(ctx.job_id, ctx.unit_index).await?;
        if unit.status.is_terminal() {
            info!(
                "{} 单元已是 {}，第 {} 次投递不再计算",
                ctx, unit.status, ctx.attempt
            );
            return self.resume(ctx, callback).await;
        }

        info!("{} 开始处理 {}", ctx, input.describe());

        // ========== 2. 执行计算 ==========
        let result = compute.compute(input).await;
        let unit_status = result.status();
        match &result {
            UnitResult::Success(_) => info!("{} ✓ 计算成功", ctx),
            UnitResult::Failure(reason) => warn!("{} ⚠️ 计算失败: {}", ctx, reason),
        }

        // ========== 3. 条件写入结果并计数 ==========
        let counted = self
            .gate
            .counter()
            .complete_unit_and_get(ctx.job_id, ctx.unit_index, result.into_patch())
            .await?;
        let Some(state) = counted else {
            info!("{} 单元已被其他调用完成，本次结果丢弃", ctx);
            return Ok(WorkerOutcome::Duplicate);
        };

        // ========== 4. 闸门判断 ==========
        let decision = self.gate.decide(ctx.job_id, state).await?;

        // ========== 5. 完成回调 ==========
        if decision == TransitionDecision::JustCompleted {
            info!("{} 🎯 作业全部单元已到齐，执行完成回调", ctx);
            self.run_callback(ctx, callback).await?;
        }

        Ok(WorkerOutcome::Recorded {
            unit_status,
            decision,
        })
    }

    /// 单元已是终态时补做作业收尾
    async fn resume(
        &self,
        ctx: &UnitCtx,
        callback: &dyn CompletionCallback,
    ) -> AppResult<WorkerOutcome> {
        let job = self.store.get_job(ctx.job_id).await?;

        let decision = if Status::OPEN.contains(&job.status) {
            // 计数到齐而作业仍未切换时在这里补做切换
            self.gate.decide(ctx.job_id, job.counter()).await?
        } else if job.status == Status::Done && !job.callback_done {
            TransitionDecision::JustCompleted
        } else {
            return Ok(WorkerOutcome::Duplicate);
        };

        if decision != TransitionDecision::JustCompleted {
            return Ok(WorkerOutcome::Duplicate);
        }

        info!("{} 🔁 补做作业 {} 的完成回调", ctx, ctx.job_id);
        self.run_callback(ctx, callback).await?;
        Ok(WorkerOutcome::Resumed { decision })
    }

    async fn run_callback(&self, ctx: &UnitCtx, callback: &dyn CompletionCallback) -> AppResult<()> {
        if let Err(e) = callback.on_job_complete(ctx.job_id).await {
            error!("{} ❌ 完成回调失败: {}", ctx, e);
            return Err(e);
        }
        self.store.mark_callback_done(ctx.job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::InMemoryStore;
    use crate::models::{DocumentId, JobKind, PageInput, UnitRecord};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCompute {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedCompute {
        fn ok() -> Self {
            Self {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl UnitCompute for FixedCompute {
        async fn compute(&self, _input: &UnitInput) -> UnitResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                UnitResult::Failure("识别失败".to_string())
            } else {
                UnitResult::Success(json!("# 第一题"))
            }
        }
    }

    #[derive(Default)]
    struct CountingCallback {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionCallback for CountingCallback {
        async fn on_job_complete(&self, _job_id: JobId) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// 前 `failures` 次调用返回存储不可用
    struct FlakyCallback {
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionCallback for FlakyCallback {
        async fn on_job_complete(&self, _job_id: JobId) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failed = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            match failed {
                Ok(_) => Err(crate::error::AppError::store_unavailable("回调写入失败")),
                Err(_) => Ok(()),
            }
        }
    }

    fn page() -> UnitInput {
        UnitInput::Page(PageInput {
            page_number: 1,
            file_name: "p-1.png".to_string(),
            media_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        })
    }

    async fn setup(total: usize) -> (Arc<InMemoryStore>, UnitWorker, JobId) {
        let store = Arc::new(InMemoryStore::new());
        let job_id = store
            .create_job(
                JobKind::Ocr {
                    document_id: DocumentId::new(),
                },
                total,
            )
            .await
            .unwrap();
        store
            .write_units(job_id, (0..total).map(UnitRecord::pending).collect())
            .await
            .unwrap();
        (store.clone(), UnitWorker::new(store), job_id)
    }

    #[tokio::test]
    async fn test_failed_unit_still_counts() {
        let (store, worker, job_id) = setup(1).await;
        let callback = CountingCallback::default();

        let outcome = worker
            .process(&UnitCtx::new(job_id, 0, 1), &page(), &FixedCompute::failing(), &callback)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WorkerOutcome::Recorded {
                unit_status: Status::Error,
                decision: TransitionDecision::JustCompleted,
            }
        );
        let unit = store.get_unit(job_id, 0).await.unwrap();
        assert_eq!(unit.status, Status::Error);
        assert_eq!(unit.error.as_deref(), Some("识别失败"));
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redelivery_after_done_is_duplicate() {
        let (store, worker, job_id) = setup(2).await;
        let compute = FixedCompute::ok();
        let callback = CountingCallback::default();
        let ctx = UnitCtx::new(job_id, 1, 1);

        worker.process(&ctx, &page(), &compute, &callback).await.unwrap();
        let again = worker
            .process(&UnitCtx::new(job_id, 1, 2), &page(), &compute, &callback)
            .await
            .unwrap();

        assert_eq!(again, WorkerOutcome::Duplicate);
        assert_eq!(compute.calls.load(Ordering::SeqCst), 1);
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.completed_units, 1);
        assert_eq!(job.status, Status::Processing);
        assert_eq!(store.get_unit(job_id, 1).await.unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_unit_left_processing_is_rerun() {
        let (store, worker, job_id) = setup(1).await;
        // 模拟上一次调用超时：单元停在 processing，计数未变
        store.record_attempt(job_id, 0).await.unwrap();

        let callback = CountingCallback::default();
        let outcome = worker
            .process(&UnitCtx::new(job_id, 0, 2), &page(), &FixedCompute::ok(), &callback)
            .await
            .unwrap();

        assert!(matches!(outcome, WorkerOutcome::Recorded { unit_status: Status::Done, .. }));
        assert_eq!(store.get_job(job_id).await.unwrap().status, Status::Done);
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_unit_is_error() {
        let (_store, worker, job_id) = setup(1).await;
        let result = worker
            .process(
                &UnitCtx::new(job_id, 7, 1),
                &page(),
                &FixedCompute::ok(),
                &CountingCallback::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_store_failure_while_counting_is_retried() {
        let (store, worker, job_id) = setup(1).await;
        let compute = FixedCompute::ok();
        let callback = CountingCallback::default();

        // record_attempt 放行，写入结果并计数的那一步失败
        store.inject_unavailable_after(1, 1);
        let err = worker
            .process(&UnitCtx::new(job_id, 0, 1), &page(), &compute, &callback)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let outcome = worker
            .process(&UnitCtx::new(job_id, 0, 2), &page(), &compute, &callback)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            WorkerOutcome::Recorded {
                decision: TransitionDecision::JustCompleted,
                ..
            }
        ));
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Done);
        assert_eq!(job.completed_units, 1);
        assert!(job.callback_done);
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_counted_unit_finishes_job_on_redelivery() {
        let (store, worker, job_id) = setup(1).await;
        let compute = FixedCompute::ok();
        let callback = CountingCallback::default();

        // 结果与计数已提交，切换作业状态时存储故障
        store.inject_unavailable_after(2, 1);
        assert!(worker
            .process(&UnitCtx::new(job_id, 0, 1), &page(), &compute, &callback)
            .await
            .unwrap_err()
            .is_retryable());
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.completed_units, 1);
        assert_eq!(job.status, Status::Processing);

        let outcome = worker
            .process(&UnitCtx::new(job_id, 0, 2), &page(), &compute, &callback)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WorkerOutcome::Resumed {
                decision: TransitionDecision::JustCompleted
            }
        );
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Done);
        assert_eq!(job.completed_units, 1);
        assert_eq!(compute.calls.load(Ordering::SeqCst), 1);
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_callback_reruns_on_redelivery() {
        let (store, worker, job_id) = setup(1).await;
        let compute = FixedCompute::ok();
        let callback = FlakyCallback {
            failures: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
        };

        assert!(worker
            .process(&UnitCtx::new(job_id, 0, 1), &page(), &compute, &callback)
            .await
            .unwrap_err()
            .is_retryable());
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Done);
        assert!(!job.callback_done);

        let outcome = worker
            .process(&UnitCtx::new(job_id, 0, 2), &page(), &compute, &callback)
            .await
            .unwrap();
        assert!(matches!(outcome, WorkerOutcome::Resumed { .. }));
        assert!(store.get_job(job_id).await.unwrap().callback_done);
        assert_eq!(callback.calls.load(Ordering::SeqCst), 2);

        // 回调成功之后的投递不再触发回调
        let again = worker
            .process(&UnitCtx::new(job_id, 0, 3), &page(), &compute, &callback)
            .await
            .unwrap();
        assert_eq!(again, WorkerOutcome::Duplicate);
        assert_eq!(callback.calls.load(Ordering::SeqCst), 2);
        assert_eq!(compute.calls.load(Ordering::SeqCst), 1);
    }
}
