//! 集群节点（AgentNode）
//!
//! 每个节点有唯一 id、角色、状态、上下文、错误历史与自己的 Monitor。
//! Coordinator 拥有有序的子节点列表；子节点只记录父节点 id，不持有父节点引用。
//! 所有状态修改后立即写入 PersistenceGateway（失败只记日志）。

pub mod context;
pub mod task;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::coordinator;
use crate::core::{HiveError, NodeKind, NodeStatus};
use crate::hive::Hive;
use crate::llm::Role;
use crate::monitor::{Monitor, MonitorEvent, MonitorEventKind};
use crate::persistence::child_result_key;
use crate::worker;

pub use context::{Context, ConversationEntry, ExecutionEntry, TaskState};
pub use task::{Task, TaskContext, TaskId, TaskResult};

pub type NodeId = String;

/// 错误历史保留的最大条数（FIFO 淘汰）
pub const ERROR_HISTORY_CAPACITY: usize = 20;

/// 节点配置；recreate 时原样沿用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub monitor_enabled: bool,
    pub monitor_interval_ms: u64,
    pub oracle_timeout_ms: u64,
    pub error_loop_threshold: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_ms: 300_000,
            monitor_enabled: true,
            monitor_interval_ms: 5_000,
            oracle_timeout_ms: 60_000,
            error_loop_threshold: 3,
        }
    }
}

impl NodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms.max(1))
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_monitor_interval_ms(mut self, interval_ms: u64) -> Self {
        self.monitor_interval_ms = interval_ms;
        self
    }

    pub fn with_oracle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.oracle_timeout_ms = timeout_ms;
        self
    }

    pub fn without_monitor(mut self) -> Self {
        self.monitor_enabled = false;
        self
    }
}

/// 持久化的节点快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub parent_id: Option<NodeId>,
    pub status: NodeStatus,
    pub current_task: Option<Task>,
    pub context: Context,
    pub error_history: Vec<String>,
    pub error_count: u64,
    pub config: NodeConfig,
    pub children: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 层级结构视图（用于 CLI 输出与调试）
#[derive(Debug, Clone, Serialize)]
pub struct NodeTree {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeTree>,
}

struct NodeState {
    status: NodeStatus,
    current_task: Option<Task>,
    task_started: Option<Instant>,
    context: Context,
    error_history: VecDeque<String>,
    error_count: u64,
    updated_at: DateTime<Utc>,
}

pub(crate) struct NodeInner {
    id: NodeId,
    name: String,
    kind: NodeKind,
    parent_id: Option<NodeId>,
    config: NodeConfig,
    created_at: DateTime<Utc>,
    hive: Hive,
    state: RwLock<NodeState>,
    children: RwLock<Vec<AgentNode>>,
    child_seq: AtomicUsize,
    monitor: Monitor,
}

/// 节点句柄；克隆开销很小，所有克隆指向同一节点
#[derive(Clone)]
pub struct AgentNode {
    inner: Arc<NodeInner>,
}

impl std::fmt::Debug for AgentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentNode")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl AgentNode {
    pub(crate) fn new(
        hive: Hive,
        name: impl Into<String>,
        kind: NodeKind,
        parent_id: Option<NodeId>,
        config: NodeConfig,
    ) -> Self {
        let id = format!("{}_{}", kind.as_str(), uuid::Uuid::new_v4());
        let now = Utc::now();
        let inner = Arc::new_cyclic(|weak| NodeInner {
            monitor: Monitor::new(weak.clone(), id.clone(), &config),
            id,
            name: name.into(),
            kind,
            parent_id,
            config,
            created_at: now,
            hive,
            state: RwLock::new(NodeState {
                status: NodeStatus::Idle,
                current_task: None,
                task_started: None,
                context: Context::new(),
                error_history: VecDeque::with_capacity(ERROR_HISTORY_CAPACITY),
                error_count: 0,
                updated_at: now,
            }),
            children: RwLock::new(Vec::new()),
            child_seq: AtomicUsize::new(0),
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Arc<NodeInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.inner.parent_id.as_deref()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    pub fn monitor(&self) -> &Monitor {
        &self.inner.monitor
    }

    pub(crate) fn hive(&self) -> &Hive {
        &self.inner.hive
    }

    pub async fn status(&self) -> NodeStatus {
        self.inner.state.read().await.status
    }

    pub async fn current_task(&self) -> Option<Task> {
        self.inner.state.read().await.current_task.clone()
    }

    pub async fn context(&self) -> Context {
        self.inner.state.read().await.context.clone()
    }

    pub async fn error_history(&self) -> Vec<String> {
        self.inner.state.read().await.error_history.iter().cloned().collect()
    }

    pub async fn error_count(&self) -> u64 {
        self.inner.state.read().await.error_count
    }

    pub async fn children(&self) -> Vec<AgentNode> {
        self.inner.children.read().await.clone()
    }

    /// 初始化：状态置为 Idle、写入首个快照，按配置启动 Monitor
    pub async fn initialize(&self) {
        {
            let mut state = self.inner.state.write().await;
            if state.status.is_terminal() {
                debug!(node_id = %self.id(), "Skip initialize on terminated node");
                return;
            }
            state.status = NodeStatus::Idle;
            state.updated_at = Utc::now();
        }
        self.persist().await;

        if self.inner.config.monitor_enabled {
            self.inner.monitor.start();
        }
        info!(
            node_id = %self.id(),
            name = %self.name(),
            kind = %self.kind(),
            "Node initialized"
        );
    }

    /// 执行任务；任何失败都转成 success=false 的 TaskResult，不会向调用方抛错
    pub async fn execute_task(&self, task: Task) -> TaskResult {
        {
            let mut state = self.inner.state.write().await;
            if !state.status.can_transition_to(NodeStatus::Running) {
                let err = HiveError::InvalidState {
                    node_id: self.inner.id.clone(),
                    status: state.status,
                };
                warn!(node_id = %self.id(), task_id = %task.id, "{err}");
                return TaskResult::failure(&task.id, err.to_string());
            }
            state.status = NodeStatus::Running;
            state.current_task = Some(task.clone());
            state.task_started = Some(Instant::now());
            state.context.begin_task(&task.id);
            state.updated_at = Utc::now();
        }
        info!(node_id = %self.id(), kind = %self.kind(), task_id = %task.id, "Task started");
        self.persist().await;

        let outcome = match self.kind() {
            NodeKind::Worker => worker::perform(self, &task).await,
            NodeKind::Coordinator => coordinator::perform(self, &task).await,
        };

        let (result, status) = match outcome {
            Ok(result) => {
                let status = if result.success {
                    NodeStatus::Completed
                } else {
                    NodeStatus::Failed
                };
                (result, status)
            }
            Err(err) => {
                let message = err.to_string();
                self.record_error(message.clone()).await;
                let status = if self.is_in_error_loop(self.inner.config.error_loop_threshold).await {
                    NodeStatus::ErrorLoop
                } else {
                    NodeStatus::Failed
                };
                (TaskResult::failure(&task.id, message), status)
            }
        };

        let result = self.finish_task(&task, result, status).await;
        self.report_to_parent(&result).await;
        result
    }

    /// 写入最终状态；执行期间被终止的节点保持 Terminated，结果改为失败
    async fn finish_task(&self, task: &Task, result: TaskResult, status: NodeStatus) -> TaskResult {
        let (result, final_status) = {
            let mut state = self.inner.state.write().await;
            let result = match state.status {
                NodeStatus::Terminated => {
                    TaskResult::failure(&task.id, HiveError::Terminated(self.inner.id.clone()).to_string())
                }
                current if current == NodeStatus::Running && current.can_transition_to(status) => {
                    state.status = status;
                    result
                }
                // Monitor 在执行期间强制标记了 ErrorLoop
                _ => result,
            };
            state.task_started = None;
            if result.success {
                state.context.complete_task(&task.id);
            }
            state.updated_at = Utc::now();
            (result, state.status)
        };

        info!(
            node_id = %self.id(),
            task_id = %task.id,
            success = result.success,
            status = %final_status,
            "Task finished"
        );
        self.persist().await;
        result
    }

    /// 把结果写到父节点名下的 key；父节点不会同步读取
    async fn report_to_parent(&self, result: &TaskResult) {
        let Some(parent_id) = self.parent_id() else {
            return;
        };
        let key = child_result_key(parent_id, self.id());
        let record = json!({
            "child_id": self.id(),
            "result": result,
        });
        if let Err(e) = self.hive().store().put(&key, record).await {
            warn!(node_id = %self.id(), key = %key, error = %e, "Failed to report result to parent");
        }
    }

    /// 记录一次错误：追加到错误历史（最多保留 20 条）、计数加一、持久化、通知 Monitor
    pub async fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        let error_count = {
            let mut state = self.inner.state.write().await;
            state.error_history.push_back(message.clone());
            while state.error_history.len() > ERROR_HISTORY_CAPACITY {
                state.error_history.pop_front();
            }
            state.error_count += 1;
            state.updated_at = Utc::now();
            state.error_count
        };
        warn!(node_id = %self.id(), error_count, "{message}");
        self.persist().await;

        self.inner
            .monitor
            .report_event(MonitorEvent::new(
                MonitorEventKind::ErrorDetected,
                self.id(),
                json!({ "error_count": error_count, "message": message }),
            ))
            .await;
    }

    /// 最近 threshold 条错误是否完全相同
    pub async fn is_in_error_loop(&self, threshold: usize) -> bool {
        if threshold == 0 {
            return false;
        }
        let state = self.inner.state.read().await;
        let history = &state.error_history;
        if history.len() < threshold {
            return false;
        }
        let mut recent = history.iter().rev().take(threshold);
        match recent.next() {
            Some(last) => recent.all(|m| m == last),
            None => false,
        }
    }

    /// Monitor 检测到错误循环时调用；返回是否发生了状态变化
    pub(crate) async fn force_error_loop(&self) -> bool {
        {
            let mut state = self.inner.state.write().await;
            if !state.status.can_transition_to(NodeStatus::ErrorLoop) {
                return false;
            }
            state.status = NodeStatus::ErrorLoop;
            state.updated_at = Utc::now();
        }
        warn!(node_id = %self.id(), "Node marked as error loop");
        self.persist().await;
        true
    }

    /// 当前任务已运行的时长（仅 Running 状态）
    pub(crate) async fn running_elapsed(&self) -> Option<Duration> {
        let state = self.inner.state.read().await;
        match (state.status, state.task_started) {
            (NodeStatus::Running, Some(started)) => Some(started.elapsed()),
            _ => None,
        }
    }

    /// 终止节点及其全部子孙；幂等
    pub fn terminate<'a>(&'a self, reason: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            {
                let mut state = self.inner.state.write().await;
                if !state.status.can_transition_to(NodeStatus::Terminated) {
                    debug!(node_id = %self.id(), "Already terminated");
                    return;
                }
                state.status = NodeStatus::Terminated;
                state.context.push_execution("terminate", reason);
                state.updated_at = Utc::now();
            }
            info!(node_id = %self.id(), reason, "Terminating node");

            let children = self.children().await;
            let derived = format!("Parent {} terminated: {}", self.id(), reason);
            for child in &children {
                child.terminate(&derived).await;
            }

            self.inner.monitor.stop();
            self.inner
                .monitor
                .report_event(MonitorEvent::new(
                    MonitorEventKind::Terminated,
                    self.id(),
                    json!({ "reason": reason }),
                ))
                .await;
            self.persist().await;
        })
    }

    /// 终止当前节点，以相同 name / kind / config / parent 创建新身份的节点并初始化
    ///
    /// 错误历史、上下文与子节点都不继承。调用方负责在父节点中替换引用（见 `replace_child`）。
    pub async fn recreate(&self) -> AgentNode {
        self.terminate("recreating due to error loop").await;

        let node = AgentNode::new(
            self.hive().clone(),
            self.name(),
            self.kind(),
            self.inner.parent_id.clone(),
            self.inner.config.clone(),
        );
        node.initialize().await;

        self.inner
            .monitor
            .report_event(MonitorEvent::new(
                MonitorEventKind::Recreated,
                self.id(),
                json!({ "replacement_id": node.id() }),
            ))
            .await;
        info!(old_id = %self.id(), new_id = %node.id(), "Node recreated");
        node
    }

    /// 在当前 Coordinator 下创建、初始化并收养一个子节点
    pub async fn spawn_child(
        &self,
        name: impl Into<String>,
        kind: NodeKind,
    ) -> Result<AgentNode, HiveError> {
        self.ensure_can_adopt().await?;
        let child = AgentNode::new(
            self.hive().clone(),
            name,
            kind,
            Some(self.inner.id.clone()),
            self.inner.config.clone(),
        );
        child.initialize().await;
        self.adopt(child.clone()).await?;
        Ok(child)
    }

    async fn ensure_can_adopt(&self) -> Result<(), HiveError> {
        let status = self.status().await;
        if self.kind() != NodeKind::Coordinator || status.is_terminal() {
            return Err(HiveError::InvalidState {
                node_id: self.inner.id.clone(),
                status,
            });
        }
        Ok(())
    }

    /// 收养子节点；子节点必须在创建时以本节点为 parent
    pub async fn adopt(&self, child: AgentNode) -> Result<(), HiveError> {
        self.ensure_can_adopt().await?;
        if child.parent_id() != Some(self.id()) {
            return Err(HiveError::InvalidState {
                node_id: child.inner.id.clone(),
                status: child.status().await,
            });
        }
        debug!(parent_id = %self.id(), child_id = %child.id(), "Child adopted");
        self.inner.children.write().await.push(child);
        self.persist().await;
        Ok(())
    }

    /// 原位替换子节点（保持顺序）；未找到 old_id 时返回 false
    pub async fn replace_child(&self, old_id: &str, replacement: AgentNode) -> bool {
        let replaced = {
            let mut children = self.inner.children.write().await;
            match children.iter().position(|c| c.id() == old_id) {
                Some(pos) => {
                    children[pos] = replacement;
                    true
                }
                None => false,
            }
        };
        if replaced {
            self.persist().await;
        }
        replaced
    }

    /// 移除已终止的子节点；返回移除数量
    pub async fn prune_terminated_children(&self) -> usize {
        let children = self.children().await;
        let mut terminated = Vec::new();
        for child in &children {
            if child.status().await.is_terminal() {
                terminated.push(child.inner.id.clone());
            }
        }
        if terminated.is_empty() {
            return 0;
        }
        self.inner
            .children
            .write()
            .await
            .retain(|c| !terminated.contains(&c.inner.id));
        debug!(node_id = %self.id(), removed = terminated.len(), "Pruned terminated children");
        self.persist().await;
        terminated.len()
    }

    /// 子节点命名用的递增序号，从 1 开始
    pub(crate) fn next_child_seq(&self) -> usize {
        self.inner.child_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 在子树中按 id 查找节点（包括自身）
    pub fn find<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Option<AgentNode>> {
        Box::pin(async move {
            if self.id() == id {
                return Some(self.clone());
            }
            for child in self.children().await {
                if let Some(found) = child.find(id).await {
                    return Some(found);
                }
            }
            None
        })
    }

    pub fn tree(&self) -> BoxFuture<'_, NodeTree> {
        Box::pin(async move {
            let mut children = Vec::new();
            for child in self.children().await {
                children.push(child.tree().await);
            }
            NodeTree {
                id: self.inner.id.clone(),
                name: self.inner.name.clone(),
                kind: self.kind(),
                status: self.status().await,
                children,
            }
        })
    }

    pub async fn snapshot(&self) -> NodeRecord {
        let (status, current_task, context, error_history, error_count, updated_at) = {
            let state = self.inner.state.read().await;
            (
                state.status,
                state.current_task.clone(),
                state.context.clone(),
                state.error_history.iter().cloned().collect(),
                state.error_count,
                state.updated_at,
            )
        };
        let children = self
            .inner
            .children
            .read()
            .await
            .iter()
            .map(|c| c.inner.id.clone())
            .collect();

        NodeRecord {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
            kind: self.kind(),
            parent_id: self.inner.parent_id.clone(),
            status,
            current_task,
            context,
            error_history,
            error_count,
            config: self.inner.config.clone(),
            children,
            created_at: self.inner.created_at,
            updated_at,
        }
    }

    async fn persist(&self) {
        let record = self.snapshot().await;
        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!(node_id = %self.id(), error = %e, "Failed to serialize node record");
                return;
            }
        };
        if let Err(e) = self.hive().store().put(self.id(), value).await {
            warn!(node_id = %self.id(), error = %e, "Persistence failure (ignored)");
        }
    }

    /// 追加一条对话记录
    pub async fn add_conversation(&self, role: Role, text: impl Into<String>) {
        let entry = {
            let mut state = self.inner.state.write().await;
            state.updated_at = Utc::now();
            state.context.push_conversation(role, text)
        };
        self.append_entry(entry, true).await;
    }

    /// 追加一条执行日志
    pub async fn log_execution(&self, action: impl Into<String>, result: impl Into<String>) {
        let entry = {
            let mut state = self.inner.state.write().await;
            state.updated_at = Utc::now();
            state.context.push_execution(action, result)
        };
        self.append_entry(entry, false).await;
    }

    async fn append_entry<T: Serialize>(&self, entry: T, conversation: bool) {
        let value = match serde_json::to_value(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(node_id = %self.id(), error = %e, "Failed to serialize context entry");
                return;
            }
        };
        let store = self.hive().store();
        let outcome = if conversation {
            store.append_conversation(self.id(), value).await
        } else {
            store.append_execution_log(self.id(), value).await
        };
        if let Err(e) = outcome {
            warn!(node_id = %self.id(), error = %e, "Persistence failure (ignored)");
        }
    }

    pub async fn set_custom_data(&self, key: impl Into<String>, value: Value) {
        {
            let mut state = self.inner.state.write().await;
            state.context.custom_data.insert(key.into(), value);
            state.updated_at = Utc::now();
        }
        self.persist().await;
    }

    /// 对当前任务的最近一次执行结果做自测；从不报错
    pub async fn self_test(&self) -> bool {
        worker::self_test(self).await
    }

    /// 将任务分解为有序子任务（仅 Coordinator 有意义）
    pub async fn decompose_task(&self, task: &Task) -> Vec<Task> {
        coordinator::decompose_task(self, task).await
    }

    /// 把子任务的隔离视图分派给指定或可用的 Worker
    pub async fn dispatch_task(&self, subtask: &Task, worker: Option<AgentNode>) -> TaskResult {
        match coordinator::dispatch(self, subtask, worker).await {
            Ok((_, result)) => result,
            Err(e) => {
                warn!(node_id = %self.id(), task_id = %subtask.id, error = %e, "Dispatch failed");
                TaskResult::failure(&subtask.id, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;

    fn worker() -> AgentNode {
        let hive = Hive::in_memory(Arc::new(ScriptedOracle::new()));
        hive.create_worker("w", NodeConfig::default().without_monitor())
    }

    #[tokio::test]
    async fn test_new_node_is_idle_with_prefixed_id() {
        let node = worker();
        assert!(node.id().starts_with("worker_"));
        assert_eq!(node.status().await, NodeStatus::Idle);
        assert!(node.context().await.conversation_history.is_empty());
    }

    #[tokio::test]
    async fn test_error_loop_detection() {
        let node = worker();
        assert!(!node.is_in_error_loop(3).await);
        node.record_error("boom").await;
        node.record_error("boom").await;
        assert!(!node.is_in_error_loop(3).await);
        node.record_error("boom").await;
        assert!(node.is_in_error_loop(3).await);
        assert!(!node.is_in_error_loop(0).await);

        node.record_error("different").await;
        assert!(!node.is_in_error_loop(3).await);
        assert_eq!(node.error_count().await, 4);
    }

    #[tokio::test]
    async fn test_error_history_capped() {
        let node = worker();
        for i in 0..25 {
            node.record_error(format!("e{i}")).await;
        }
        let history = node.error_history().await;
        assert_eq!(history.len(), ERROR_HISTORY_CAPACITY);
        assert_eq!(history.first().map(String::as_str), Some("e5"));
        assert_eq!(node.error_count().await, 25);
    }

    #[tokio::test]
    async fn test_snapshot_is_persisted() {
        let oracle = Arc::new(ScriptedOracle::new());
        let hive = Hive::in_memory(oracle);
        let node = hive.create_worker("w", NodeConfig::default().without_monitor());
        node.initialize().await;
        node.set_custom_data("k", json!(1)).await;

        let stored = hive.store().get(node.id()).await.unwrap().unwrap();
        let record: NodeRecord = serde_json::from_value(stored).unwrap();
        assert_eq!(record.status, NodeStatus::Idle);
        assert_eq!(record.context.custom_data["k"], json!(1));
    }

    #[tokio::test]
    async fn test_force_error_loop_follows_state_machine() {
        let node = worker();
        node.initialize().await;
        assert!(node.force_error_loop().await);
        assert_eq!(node.status().await, NodeStatus::ErrorLoop);
        assert!(!node.force_error_loop().await);

        node.terminate("done").await;
        assert!(!node.force_error_loop().await);
        assert_eq!(node.status().await, NodeStatus::Terminated);
    }

    #[tokio::test]
    async fn test_prune_terminated_children() {
        let hive = Hive::in_memory(Arc::new(ScriptedOracle::new()));
        let root = hive.create_root_node("root", NodeConfig::default().without_monitor());
        root.initialize().await;
        let gone = root.spawn_child("gone", NodeKind::Worker).await.unwrap();
        let kept = root.spawn_child("kept", NodeKind::Worker).await.unwrap();
        gone.terminate("timeout").await;

        assert_eq!(root.prune_terminated_children().await, 1);
        let ids: Vec<_> = root.children().await.iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, vec![kept.id().to_string()]);
        assert_eq!(root.snapshot().await.children, ids);
        assert_eq!(root.prune_terminated_children().await, 0);
    }

    #[tokio::test]
    async fn test_worker_cannot_spawn_children() {
        let node = worker();
        let err = node.spawn_child("x", NodeKind::Worker).await.unwrap_err();
        assert!(matches!(err, HiveError::InvalidState { .. }));
    }
}
