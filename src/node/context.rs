//! 节点上下文：对话历史、任务状态、执行日志、自定义数据
//!
//! 构造时为空；conversation_history / execution_log / task_history 只追加不修改。
//! 每次修改都由 AgentNode 立即持久化。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::Role;
use crate::node::TaskId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub action: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub current_task_id: Option<TaskId>,
    pub task_history: Vec<TaskId>,
    pub completed_tasks: BTreeSet<TaskId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub conversation_history: Vec<ConversationEntry>,
    pub task_state: TaskState,
    pub execution_log: Vec<ExecutionEntry>,
    pub custom_data: Map<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_conversation(&mut self, role: Role, text: impl Into<String>) -> ConversationEntry {
        let entry = ConversationEntry {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        };
        self.conversation_history.push(entry.clone());
        entry
    }

    pub fn push_execution(
        &mut self,
        action: impl Into<String>,
        result: impl Into<String>,
    ) -> ExecutionEntry {
        let entry = ExecutionEntry {
            action: action.into(),
            result: result.into(),
            timestamp: Utc::now(),
        };
        self.execution_log.push(entry.clone());
        entry
    }

    pub fn begin_task(&mut self, task_id: &str) {
        self.task_state.current_task_id = Some(task_id.to_string());
        self.task_state.task_history.push(task_id.to_string());
    }

    pub fn complete_task(&mut self, task_id: &str) {
        self.task_state.completed_tasks.insert(task_id.to_string());
    }

    /// 最近一次指定 action 的结果
    pub fn last_result_of(&self, action: &str) -> Option<&str> {
        self.execution_log
            .iter()
            .rev()
            .find(|e| e.action == action)
            .map(|e| e.result.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = Context::new();
        assert!(ctx.conversation_history.is_empty());
        assert!(ctx.execution_log.is_empty());
        assert!(ctx.task_state.current_task_id.is_none());
        assert!(ctx.custom_data.is_empty());
    }

    #[test]
    fn test_task_state_tracking() {
        let mut ctx = Context::new();
        ctx.begin_task("t1");
        ctx.complete_task("t1");
        ctx.begin_task("t2");
        assert_eq!(ctx.task_state.current_task_id.as_deref(), Some("t2"));
        assert_eq!(ctx.task_state.task_history, vec!["t1", "t2"]);
        assert!(ctx.task_state.completed_tasks.contains("t1"));
        assert!(!ctx.task_state.completed_tasks.contains("t2"));
    }

    #[test]
    fn test_last_result_of() {
        let mut ctx = Context::new();
        ctx.push_execution("execute", "first");
        ctx.push_execution("self_test", "passed");
        ctx.push_execution("execute", "second");
        assert_eq!(ctx.last_result_of("execute"), Some("second"));
        assert_eq!(ctx.last_result_of("missing"), None);
    }
}
