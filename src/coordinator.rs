//! Coordinator 角色：分解任务、按顺序分派给 Worker、汇总结果
//!
//! 子任务严格串行执行，顺序即分解顺序；priority / dependencies 仅作为信息保留。
//! Worker 只收到子任务的隔离视图（instruction + step + total_steps）。
//! 子任务失败后由 RecoveryEngine 决定：普通失败在同一 Worker 上重试（最多 max_retries 次），
//! Worker 进入 ErrorLoop 时 recreate 并重试一次。

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::core::{HiveError, NodeKind, NodeStatus, RecoveryAction, RecoveryAttempts, RecoveryEngine};
use crate::llm::Role;
use crate::node::{AgentNode, Task, TaskContext, TaskResult};
use crate::oracle::{bounded, fallback_plan};

/// 汇总结果的 output 结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub sub_task_count: usize,
    pub success_count: usize,
    pub self_test_passed_count: usize,
    pub outputs: Vec<String>,
    pub combined_output: String,
}

pub(crate) async fn perform(node: &AgentNode, task: &Task) -> Result<TaskResult, HiveError> {
    node.add_conversation(Role::User, task.description.as_str())
        .await;

    let subtasks = decompose_task(node, task).await;
    let recovery = RecoveryEngine::new(node.config().max_retries);
    let mut results = Vec::with_capacity(subtasks.len());

    for subtask in &subtasks {
        if node.status().await.is_terminal() {
            return Err(HiveError::Terminated(format!(
                "{} stopped before {}",
                node.id(),
                subtask.id
            )));
        }

        let (mut worker, mut result) = dispatch(node, subtask, None).await?;
        let mut attempts = RecoveryAttempts::default();
        loop {
            match recovery.handle(worker.status().await, attempts) {
                RecoveryAction::Retry => {
                    attempts.retries += 1;
                    debug!(
                        node_id = %node.id(),
                        worker_id = %worker.id(),
                        task_id = %subtask.id,
                        retry = attempts.retries,
                        "Retrying subtask on the same worker"
                    );
                }
                RecoveryAction::RecreateAndRetry => {
                    warn!(
                        node_id = %node.id(),
                        worker_id = %worker.id(),
                        task_id = %subtask.id,
                        "Worker in error loop, recreating"
                    );
                    let replacement = worker.recreate().await;
                    node.replace_child(worker.id(), replacement.clone()).await;
                    attempts.recreates += 1;
                    worker = replacement;
                }
                RecoveryAction::Accept | RecoveryAction::Abandon => break,
            }
            (worker, result) = dispatch(node, subtask, Some(worker)).await?;
        }

        node.log_execution(
            "dispatch",
            format!(
                "{} -> {}: {}",
                subtask.id,
                worker.id(),
                if result.success { "ok" } else { "failed" }
            ),
        )
        .await;
        results.push(result);
    }

    let aggregated = aggregate_results(&task.id, &results);
    info!(
        node_id = %node.id(),
        task_id = %task.id,
        subtasks = results.len(),
        success = aggregated.success,
        "Subtasks aggregated"
    );
    if let Some(text) = aggregated.output_text() {
        node.add_conversation(Role::Assistant, text).await;
    }
    Ok(aggregated)
}

/// 调用 Oracle 分解任务；失败或返回空计划时使用固定三步计划
pub(crate) async fn decompose_task(node: &AgentNode, task: &Task) -> Vec<Task> {
    let oracle = node.hive().oracle();
    let plan = match bounded(node.config().oracle_timeout(), oracle.decompose(&task.description)).await {
        Ok(plan) if !plan.is_empty() => plan,
        Ok(_) => {
            warn!(node_id = %node.id(), task_id = %task.id, "Oracle returned an empty plan, using fallback");
            fallback_plan(&task.description)
        }
        Err(e) => {
            warn!(node_id = %node.id(), task_id = %task.id, error = %e, "Decompose failed, using fallback");
            fallback_plan(&task.description)
        }
    };

    let total = plan.len();
    let original_context = task
        .context
        .as_ref()
        .and_then(|c| serde_json::to_value(c).ok());
    let outline: Vec<String> = plan
        .iter()
        .map(|p| format!("{}(p{}, deps: [{}])", p.id, p.priority, p.dependencies.join(",")))
        .collect();
    node.log_execution("decompose", format!("{total} subtasks: {}", outline.join(" -> ")))
        .await;

    plan.into_iter()
        .enumerate()
        .map(|(i, planned)| {
            let mut extra = Map::new();
            extra.insert("planned_id".to_string(), json!(planned.id));
            extra.insert("priority".to_string(), json!(planned.priority));
            extra.insert("dependencies".to_string(), json!(planned.dependencies));
            let context = TaskContext {
                instruction: None,
                step: Some(i + 1),
                total_steps: Some(total),
                original_context: original_context.clone(),
                extra,
            };
            Task::new(planned.description)
                .with_id(format!("{}.{}", task.id, i + 1))
                .with_parent(task.id.clone())
                .with_context(context)
        })
        .collect()
}

/// Worker 能看到的唯一视图
fn isolate(subtask: &Task) -> Task {
    let ctx = subtask.context.as_ref();
    let step = ctx.and_then(|c| c.step).unwrap_or(1);
    let total = ctx.and_then(|c| c.total_steps).unwrap_or(1);
    Task {
        id: subtask.id.clone(),
        description: subtask.description.clone(),
        context: Some(TaskContext::isolated(subtask.description.as_str(), step, total)),
        parent_task_id: subtask.parent_task_id.clone(),
        created_at: subtask.created_at,
        deadline: subtask.deadline,
    }
}

/// 选取子 Worker：先清理已终止的子节点，再依次尝试 Idle / Completed、Failed、ErrorLoop（recreate 后使用），
/// 都没有时新建
async fn acquire_worker(node: &AgentNode) -> Result<AgentNode, HiveError> {
    node.prune_terminated_children().await;

    let mut failed = None;
    let mut looping = None;
    for child in node.children().await {
        if child.kind() != NodeKind::Worker {
            continue;
        }
        match child.status().await {
            status if status.is_available() => return Ok(child),
            NodeStatus::Failed if failed.is_none() => failed = Some(child),
            NodeStatus::ErrorLoop if looping.is_none() => looping = Some(child),
            _ => {}
        }
    }

    if let Some(child) = failed {
        return Ok(child);
    }
    if let Some(child) = looping {
        let replacement = child.recreate().await;
        node.replace_child(child.id(), replacement.clone()).await;
        return Ok(replacement);
    }
    let name = format!("{}-worker-{}", node.name(), node.next_child_seq());
    node.spawn_child(name, NodeKind::Worker).await
}

pub(crate) async fn dispatch(
    node: &AgentNode,
    subtask: &Task,
    worker: Option<AgentNode>,
) -> Result<(AgentNode, TaskResult), HiveError> {
    if node.kind() != NodeKind::Coordinator {
        return Err(HiveError::InvalidState {
            node_id: node.id().to_string(),
            status: node.status().await,
        });
    }
    let worker = match worker {
        Some(worker) => worker,
        None => acquire_worker(node).await?,
    };
    debug!(node_id = %node.id(), worker_id = %worker.id(), task_id = %subtask.id, "Dispatching subtask");
    // Coordinator 的 execute_task 经由这里间接递归，需要装箱
    let result = Box::pin(worker.execute_task(isolate(subtask))).await;
    Ok((worker, result))
}

/// 汇总子任务结果：全部成功且自测通过才算成功；错误以 "; " 连接
pub fn aggregate_results(task_id: &str, results: &[TaskResult]) -> TaskResult {
    let success_count = results.iter().filter(|r| r.success).count();
    let self_test_passed_count = results
        .iter()
        .filter(|r| r.self_test_passed == Some(true))
        .count();
    let outputs: Vec<String> = results.iter().filter_map(TaskResult::output_text).collect();
    let errors: Vec<&str> = results.iter().filter_map(|r| r.error.as_deref()).collect();

    let summary = AggregateSummary {
        sub_task_count: results.len(),
        success_count,
        self_test_passed_count,
        combined_output: outputs.join("\n\n"),
        outputs,
    };

    TaskResult {
        task_id: task_id.to_string(),
        success: results.iter().all(TaskResult::is_verified),
        output: serde_json::to_value(&summary).ok(),
        error: (!errors.is_empty()).then(|| errors.join("; ")),
        completed_at: chrono::Utc::now(),
        self_test_passed: Some(self_test_passed_count == results.len()),
    }
}

/// 便于从 output 中取回汇总结构
pub fn summary_of(result: &TaskResult) -> Option<AggregateSummary> {
    result
        .output
        .clone()
        .and_then(|v: Value| serde_json::from_value(v).ok())
}
