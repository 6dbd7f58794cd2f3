//! Worker 角色：执行单个任务并自测
//!
//! 只读取任务的显式指令（context.instruction 或 description），不向上查找任何祖先状态。
//! 执行失败与自测失败都以 HiveError 返回，由 `AgentNode::execute_task` 记录错误并判断错误循环。

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{HiveError, NodeStatus};
use crate::llm::Role;
use crate::node::{AgentNode, Task, TaskResult};
use crate::oracle::bounded;

/// 自测未给出反馈时使用的固定信息（保证相同失败产生相同错误文本）
const SELF_TEST_REJECTED: &str = "output did not satisfy the task";

pub(crate) async fn perform(node: &AgentNode, task: &Task) -> Result<TaskResult, HiveError> {
    let instruction = task
        .instruction()
        .ok_or(HiveError::InvalidContext)?
        .to_string();
    node.add_conversation(Role::User, instruction.as_str()).await;

    let oracle = node.hive().oracle();
    let outcome = bounded(
        node.config().oracle_timeout(),
        oracle.execute(&instruction, task.context.as_ref()),
    )
    .await?;

    node.log_execution("execute", outcome.output.as_str()).await;
    node.add_conversation(Role::Assistant, outcome.output.as_str())
        .await;
    if let Some(reasoning) = &outcome.reasoning {
        debug!(node_id = %node.id(), task_id = %task.id, reasoning = %reasoning, "Oracle reasoning");
    }

    if !outcome.success {
        return Err(HiveError::OracleFailure(outcome.output));
    }

    let (passed, feedback) = run_self_test(node).await;
    if !passed {
        let feedback = feedback
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| SELF_TEST_REJECTED.to_string());
        return Err(HiveError::SelfTestFailed(feedback));
    }

    Ok(TaskResult::success(
        task.id.clone(),
        Value::String(outcome.output),
        true,
    ))
}

pub(crate) async fn self_test(node: &AgentNode) -> bool {
    run_self_test(node).await.0
}

/// 用 Oracle 判断最近一次执行结果是否完成当前任务；Oracle 不可用时退化为结构检查
async fn run_self_test(node: &AgentNode) -> (bool, Option<String>) {
    let Some(task) = node.current_task().await else {
        return (false, None);
    };
    let produced = node
        .context()
        .await
        .last_result_of("execute")
        .map(str::to_string)
        .unwrap_or_default();

    let oracle = node.hive().oracle();
    match bounded(
        node.config().oracle_timeout(),
        oracle.self_test(&task.description, &produced),
    )
    .await
    {
        Ok(verdict) => {
            let summary = if verdict.passed {
                "passed".to_string()
            } else {
                format!("failed: {}", verdict.feedback)
            };
            node.log_execution("self_test", summary).await;
            (verdict.passed, Some(verdict.feedback))
        }
        Err(e) => {
            warn!(node_id = %node.id(), error = %e, "Self-test oracle unavailable, using structural check");
            let passed = node.status().await == NodeStatus::Running;
            node.log_execution("self_test", format!("structural check: {passed}"))
                .await;
            (passed, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::hive::Hive;
    use crate::node::{NodeConfig, TaskContext};
    use crate::oracle::{ExecutionOutcome, ScriptedOracle, SelfTestVerdict};

    fn setup(oracle: ScriptedOracle) -> (Arc<ScriptedOracle>, AgentNode) {
        let oracle = Arc::new(oracle);
        let node = Hive::in_memory(oracle.clone())
            .create_worker("w", NodeConfig::default().without_monitor());
        (oracle, node)
    }

    #[tokio::test]
    async fn test_execute_success_path() {
        let (oracle, node) = setup(ScriptedOracle::new());
        node.initialize().await;
        let task = Task::new("write docs").with_context(TaskContext::isolated("write docs", 1, 1));

        let result = node.execute_task(task).await;
        assert!(result.success);
        assert_eq!(result.self_test_passed, Some(true));
        assert_eq!(result.output, Some(Value::String("done: write docs".into())));
        assert_eq!(node.status().await, NodeStatus::Completed);

        let calls = oracle.execute_calls().await;
        assert_eq!(calls.len(), 1);
        let ctx = node.context().await;
        assert_eq!(ctx.conversation_history.len(), 2);
        assert_eq!(ctx.last_result_of("self_test"), Some("passed"));
    }

    #[tokio::test]
    async fn test_missing_instruction_fails_with_invalid_context() {
        let (_, node) = setup(ScriptedOracle::new());
        node.initialize().await;
        let result = node.execute_task(Task::new("   ")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Invalid context"));
        assert_eq!(node.status().await, NodeStatus::Failed);
        assert_eq!(node.error_count().await, 1);
    }

    #[tokio::test]
    async fn test_self_test_rejection_fails_task() {
        let (_, node) = setup(ScriptedOracle::new().with_self_test_results(vec![
            Ok(SelfTestVerdict {
                passed: false,
                feedback: "missing tests".into(),
            }),
        ]));
        node.initialize().await;
        let result = node.execute_task(Task::new("write code")).await;
        assert!(!result.success);
        assert_eq!(result.self_test_passed, Some(false));
        assert!(result.error.unwrap().contains("missing tests"));
    }

    #[tokio::test]
    async fn test_oracle_failure_is_recorded() {
        let (_, node) = setup(
            ScriptedOracle::new()
                .with_execute_results(vec![Ok(ExecutionOutcome::failed("disk full"))]),
        );
        node.initialize().await;
        let result = node.execute_task(Task::new("save")).await;
        assert!(!result.success);
        assert_eq!(node.error_history().await, vec!["Oracle failure: disk full"]);
    }

    #[tokio::test]
    async fn test_terminated_node_rejects_task() {
        let (_, node) = setup(ScriptedOracle::new());
        node.initialize().await;
        node.terminate("test").await;
        let result = node.execute_task(Task::new("late")).await;
        assert!(!result.success);
        assert_eq!(node.status().await, NodeStatus::Terminated);
        assert_eq!(node.error_count().await, 0);
    }

    #[tokio::test]
    async fn test_self_test_without_task_is_false() {
        let (_, node) = setup(ScriptedOracle::new());
        assert!(!node.self_test().await);
    }
}
