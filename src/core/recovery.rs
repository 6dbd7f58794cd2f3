//! 错误恢复引擎
//!
//! 根据 Worker 执行后的状态与已消耗的重试次数返回 RecoveryAction，供 Coordinator 决定是接受结果、
//! 在同一 Worker 上重试、以新身份重建 Worker 后重试，还是放弃该子任务。

use crate::core::NodeStatus;

/// 恢复引擎给出的建议动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 接受当前结果
    Accept,
    /// 普通失败：在同一个 Worker 上重试该子任务
    Retry,
    /// Worker 已陷入错误循环：terminate 旧节点，recreate 新节点并重试一次
    RecreateAndRetry,
    /// 重试预算耗尽或节点已终止，保留当前失败结果
    Abandon,
}

/// 单个子任务已经消耗的恢复次数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryAttempts {
    /// 在同一 Worker 上的重试次数
    pub retries: u32,
    /// recreate 次数
    pub recreates: u32,
}

/// 子任务失败后的恢复策略
///
/// 普通失败在同一 Worker 上最多重试 `max_retries` 次；连续相同的失败会让 Worker 进入 ErrorLoop，
/// 此时以新身份 recreate 并只再分派一次。recreate 之后的失败不再重试。
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_retries: u32,
    max_recreates: u32,
}

impl RecoveryEngine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            max_recreates: 1,
        }
    }

    /// status 为 Worker 执行后的状态
    pub fn handle(&self, status: NodeStatus, attempts: RecoveryAttempts) -> RecoveryAction {
        match status {
            NodeStatus::ErrorLoop if attempts.recreates < self.max_recreates => {
                RecoveryAction::RecreateAndRetry
            }
            NodeStatus::ErrorLoop | NodeStatus::Terminated => RecoveryAction::Abandon,
            NodeStatus::Failed if attempts.recreates > 0 => RecoveryAction::Abandon,
            NodeStatus::Failed if attempts.retries < self.max_retries => RecoveryAction::Retry,
            NodeStatus::Failed => RecoveryAction::Abandon,
            _ => RecoveryAction::Accept,
        }
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempts(retries: u32, recreates: u32) -> RecoveryAttempts {
        RecoveryAttempts { retries, recreates }
    }

    #[test]
    fn test_recovery_error_loop_first_time() {
        let engine = RecoveryEngine::new(3);
        assert_eq!(
            engine.handle(NodeStatus::ErrorLoop, attempts(2, 0)),
            RecoveryAction::RecreateAndRetry
        );
    }

    #[test]
    fn test_recovery_error_loop_after_recreate() {
        let engine = RecoveryEngine::new(3);
        assert_eq!(
            engine.handle(NodeStatus::ErrorLoop, attempts(0, 1)),
            RecoveryAction::Abandon
        );
    }

    #[test]
    fn test_recovery_failed_retries_until_budget() {
        let engine = RecoveryEngine::new(2);
        assert_eq!(engine.handle(NodeStatus::Failed, attempts(0, 0)), RecoveryAction::Retry);
        assert_eq!(engine.handle(NodeStatus::Failed, attempts(1, 0)), RecoveryAction::Retry);
        assert_eq!(engine.handle(NodeStatus::Failed, attempts(2, 0)), RecoveryAction::Abandon);
    }

    #[test]
    fn test_recovery_no_retry_after_recreate() {
        let engine = RecoveryEngine::new(3);
        assert_eq!(engine.handle(NodeStatus::Failed, attempts(0, 1)), RecoveryAction::Abandon);
    }

    #[test]
    fn test_recovery_zero_budget() {
        let engine = RecoveryEngine::new(0);
        assert_eq!(engine.handle(NodeStatus::Failed, attempts(0, 0)), RecoveryAction::Abandon);
    }

    #[test]
    fn test_recovery_plain_outcomes() {
        let engine = RecoveryEngine::default();
        let fresh = RecoveryAttempts::default();
        assert_eq!(engine.handle(NodeStatus::Completed, fresh), RecoveryAction::Accept);
        assert_eq!(engine.handle(NodeStatus::Terminated, fresh), RecoveryAction::Abandon);
    }
}
