//! 集群错误类型
//!
//! 与 RecoveryEngine 配合：节点在 execute_task 边界把 HiveError 转为失败的 TaskResult，
//! 从不向上抛出；ErrorLoop 由连续相同错误推导得出。

use std::time::Duration;

use thiserror::Error;

use crate::core::NodeStatus;
use crate::oracle::OracleError;
use crate::persistence::PersistenceError;

/// 节点执行、分派、恢复过程中可能出现的错误
#[derive(Error, Debug)]
pub enum HiveError {
    /// 任务既没有 instruction 也没有 description
    #[error("Invalid context: task has neither instruction nor description")]
    InvalidContext,

    #[error("Self-test failed: {0}")]
    SelfTestFailed(String),

    #[error("Oracle timeout after {0:?}")]
    OracleTimeout(Duration),

    #[error("Oracle failure: {0}")]
    OracleFailure(String),

    #[error("Error loop detected on {node_id}: {message}")]
    ErrorLoop { node_id: String, message: String },

    #[error("Persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// 当前状态不允许该操作（如 Running 时再次 execute、Worker 收养子节点）
    #[error("Node {node_id} cannot do this while {status}")]
    InvalidState { node_id: String, status: NodeStatus },

    #[error("Node terminated: {0}")]
    Terminated(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<OracleError> for HiveError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Timeout(d) => HiveError::OracleTimeout(d),
            other => HiveError::OracleFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_timeout_maps_to_timeout() {
        let err: HiveError = OracleError::Timeout(Duration::from_secs(2)).into();
        assert!(matches!(err, HiveError::OracleTimeout(d) if d == Duration::from_secs(2)));
    }

    #[test]
    fn test_oracle_llm_error_maps_to_failure() {
        let err: HiveError = OracleError::Llm("rate limited".into()).into();
        match err {
            HiveError::OracleFailure(msg) => assert!(msg.contains("rate limited")),
            other => panic!("Expected OracleFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_messages_are_stable() {
        // 错误循环检测按文本精确匹配，同类错误的文本必须稳定
        let a = HiveError::SelfTestFailed("output empty".into()).to_string();
        let b = HiveError::SelfTestFailed("output empty".into()).to_string();
        assert_eq!(a, b);
        assert_eq!(
            HiveError::InvalidContext.to_string(),
            "Invalid context: task has neither instruction nor description"
        );
    }
}
