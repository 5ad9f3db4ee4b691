//! 阶段闸门
//!
//! 每个单元到齐时调用一次。计数到齐后用条件更新把作业改为 done，
//! 只有条件更新生效的那一个调用者拿到 `JustCompleted`，
//! 从而保证阶段切换的副作用只执行一次。

use std::sync::Arc;
use tracing::debug;

use super::progress_counter::ProgressCounter;
use crate::error::AppResult;
use crate::infrastructure::JobStore;
use crate::models::{CounterState, JobId, Status};

/// 闸门判断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDecision {
    /// 还有单元没到
    NotYetComplete,
    /// 本次调用完成了状态切换，由调用者执行完成回调
    JustCompleted,
    /// 已经有别的调用者完成了切换（或作业已进入终态）
    AlreadyCompleted,
}

/// 阶段闸门
#[derive(Clone)]
pub struct StageGate {
    counter: ProgressCounter,
    store: Arc<dyn JobStore>,
}

impl StageGate {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            counter: ProgressCounter::new(store.clone()),
            store,
        }
    }

    pub fn counter(&self) -> &ProgressCounter {
        &self.counter
    }

    pub async fn on_unit_complete(&self, job_id: JobId) -> AppResult<TransitionDecision> {
        let state = self.counter.increment_and_get(job_id).await?;
        self.decide(job_id, state).await
    }

    /// 根据一次原子计数返回的状态决定是否切换作业状态
    ///
    /// 计数单调不减，对同一作业用已到齐的状态重复调用也只有一次拿到 `JustCompleted`。
    pub async fn decide(&self, job_id: JobId, state: CounterState) -> AppResult<TransitionDecision> {
        debug!("作业 {} 进度: {}/{}", job_id, state.completed, state.total);

        if !state.is_complete() {
            return Ok(TransitionDecision::NotYetComplete);
        }

        let applied = self
            .store
            .compare_and_set_status(job_id, &Status::OPEN, Status::Done)
            .await?;

        if applied {
            Ok(TransitionDecision::JustCompleted)
        } else {
            Ok(TransitionDecision::AlreadyCompleted)
        }
    }
}
