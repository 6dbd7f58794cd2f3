//! 推理能力（ReasoningOracle）抽象
//!
//! 节点只通过该 trait 使用自然语言能力：decompose（任务分解）、execute（执行指令）、
//! self_test（结果自测）。每次调用都由 `bounded` 包一层超时；失败时调用方使用脚本化的兜底逻辑，
//! 原始错误不会穿出节点边界。

pub mod llm_oracle;
pub mod scripted;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::TaskContext;

pub use llm_oracle::{extract_json, LlmOracle};
pub use scripted::ScriptedOracle;

/// Oracle 调用错误
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("unparseable oracle response: {0}")]
    Parse(String),
}

/// decompose 返回的单个子任务；priority / dependencies 仅作记录，不影响调度顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSubtask {
    pub id: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_priority() -> u8 {
    5
}

impl PlannedSubtask {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority: default_priority(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 10);
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// execute 的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl ExecutionOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            reasoning: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            reasoning: None,
        }
    }
}

/// self_test 的判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestVerdict {
    pub passed: bool,
    #[serde(default)]
    pub feedback: String,
}

/// 外部推理能力：无状态，可被所有节点共享
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// 将任务文本分解为有序子任务
    async fn decompose(&self, task_text: &str) -> Result<Vec<PlannedSubtask>, OracleError>;

    /// 执行一条指令；context 只会是经过隔离的显式上下文
    async fn execute(
        &self,
        instruction: &str,
        context: Option<&TaskContext>,
    ) -> Result<ExecutionOutcome, OracleError>;

    /// 判断 produced_output 是否完成了 task_text
    async fn self_test(
        &self,
        task_text: &str,
        produced_output: &str,
    ) -> Result<SelfTestVerdict, OracleError>;
}

/// 为一次 Oracle 调用加上超时；超时只终止这一次调用
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(timeout)),
    }
}

/// decompose 失败时使用的固定三步计划：analyze -> execute -> verify
pub fn fallback_plan(task_text: &str) -> Vec<PlannedSubtask> {
    vec![
        PlannedSubtask::new("analyze", format!("Analyze the requirements of: {task_text}"))
            .with_priority(8),
        PlannedSubtask::new("execute", format!("Execute: {task_text}"))
            .with_priority(6)
            .with_dependencies(vec!["analyze".to_string()]),
        PlannedSubtask::new("verify", format!("Verify the outcome of: {task_text}"))
            .with_priority(4)
            .with_dependencies(vec!["execute".to_string()]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_plan_shape() {
        let plan = fallback_plan("build X");
        let ids: Vec<_> = plan.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["analyze", "execute", "verify"]);
        assert!(plan.iter().all(|s| s.description.contains("build X")));
        assert_eq!(plan[2].dependencies, vec!["execute".to_string()]);
    }

    #[test]
    fn test_priority_is_clamped() {
        assert_eq!(PlannedSubtask::new("a", "b").with_priority(0).priority, 1);
        assert_eq!(PlannedSubtask::new("a", "b").with_priority(42).priority, 10);
    }

    #[test]
    fn test_planned_subtask_defaults() {
        let s: PlannedSubtask =
            serde_json::from_str(r#"{"id":"s1","description":"do it"}"#).unwrap();
        assert_eq!(s.priority, 5);
        assert!(s.dependencies.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<(), OracleError> = bounded(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(OracleError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, OracleError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
