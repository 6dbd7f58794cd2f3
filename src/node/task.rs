//! 任务与结果类型
//!
//! Task / TaskResult 创建后不可变；重试产生新的 TaskResult 取代旧结果，而不是修改旧结果。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type TaskId = String;

/// 任务携带的显式上下文
///
/// 分解阶段的子任务带 step / total_steps / original_context；
/// 分派给 Worker 的视图只允许 instruction + step + total_steps（见 `isolated`）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<usize>,
    /// 父任务的完整上下文，只存在于分解阶段，绝不能到达 Worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_context: Option<Value>,
    /// 提交方附带的其它字段
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl TaskContext {
    pub fn with_instruction(instruction: impl Into<String>) -> Self {
        Self {
            instruction: Some(instruction.into()),
            ..Self::default()
        }
    }

    /// Worker 唯一允许看到的上下文形态
    pub fn isolated(instruction: impl Into<String>, step: usize, total_steps: usize) -> Self {
        Self {
            instruction: Some(instruction.into()),
            step: Some(step),
            total_steps: Some(total_steps),
            original_context: None,
            extra: Map::new(),
        }
    }

    /// 是否只包含白名单字段
    pub fn is_isolated(&self) -> bool {
        self.original_context.is_none() && self.extra.is_empty()
    }

    pub fn instruction(&self) -> Option<&str> {
        self.instruction.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: format!("task_{}", uuid::Uuid::new_v4()),
            description: description.into(),
            context: None,
            parent_task_id: None,
            created_at: Utc::now(),
            deadline: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_context(mut self, context: TaskContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent_task_id.into());
        self
    }

    /// 实际要执行的指令：优先 context.instruction，其次 description；两者都为空时返回 None
    pub fn instruction(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(TaskContext::instruction)
            .or_else(|| Some(self.description.as_str()).filter(|d| !d.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_test_passed: Option<bool>,
}

impl TaskResult {
    pub fn success(task_id: impl Into<String>, output: Value, self_test_passed: bool) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            output: Some(output),
            error: None,
            completed_at: Utc::now(),
            self_test_passed: Some(self_test_passed),
        }
    }

    pub fn failure(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            completed_at: Utc::now(),
            self_test_passed: Some(false),
        }
    }

    /// 汇总时使用的严格判定：成功且自测通过
    pub fn is_verified(&self) -> bool {
        self.success && self.self_test_passed.unwrap_or(false)
    }

    /// 输出的文本形式（字符串原样返回，其它 JSON 序列化）
    pub fn output_text(&self) -> Option<String> {
        self.output.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
