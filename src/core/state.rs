//! 节点状态定义：角色（Coordinator / Worker）与生命周期状态机
//!
//! 状态流转：Idle -> Running -> {Completed, Failed, ErrorLoop}；任意状态 -> Terminated（终态，不可离开）。
//! Completed / Failed 可再次进入 Running；ErrorLoop 只能通过 recreate 以新身份恢复。

use serde::{Deserialize, Serialize};

/// 节点角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// 分解任务、管理子节点、汇总结果
    Coordinator,
    /// 叶子节点，执行单个任务并自测
    Worker,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Coordinator => "coordinator",
            NodeKind::Worker => "worker",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 节点生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Idle,
    Running,
    Completed,
    Failed,
    /// 连续相同错误达到阈值
    ErrorLoop,
    /// 终态
    Terminated,
}

impl NodeStatus {
    /// 可被 Coordinator 复用分派的状态
    pub fn is_available(&self) -> bool {
        matches!(self, NodeStatus::Idle | NodeStatus::Completed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Terminated)
    }

    /// 状态机校验：from -> to 是否合法
    ///
    /// 除 Terminated 外的任何状态都可以被 Monitor 标记为 ErrorLoop。
    pub fn can_transition_to(&self, to: NodeStatus) -> bool {
        use NodeStatus::*;
        match (*self, to) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (ErrorLoop, _) => false,
            (Idle | Completed | Failed, Running) => true,
            (Running, Completed | Failed) => true,
            (_, ErrorLoop) => true,
            (Idle, Idle) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Running => "running",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
            NodeStatus::ErrorLoop => "error_loop",
            NodeStatus::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminated_is_absorbing() {
        for to in [
            NodeStatus::Idle,
            NodeStatus::Running,
            NodeStatus::Completed,
            NodeStatus::Failed,
            NodeStatus::ErrorLoop,
            NodeStatus::Terminated,
        ] {
            assert!(!NodeStatus::Terminated.can_transition_to(to));
        }
    }

    #[test]
    fn test_running_only_from_ready_states() {
        assert!(NodeStatus::Idle.can_transition_to(NodeStatus::Running));
        assert!(NodeStatus::Completed.can_transition_to(NodeStatus::Running));
        assert!(NodeStatus::Failed.can_transition_to(NodeStatus::Running));
        assert!(!NodeStatus::Running.can_transition_to(NodeStatus::Running));
        assert!(!NodeStatus::ErrorLoop.can_transition_to(NodeStatus::Running));
    }

    #[test]
    fn test_running_exits() {
        assert!(NodeStatus::Running.can_transition_to(NodeStatus::Completed));
        assert!(NodeStatus::Running.can_transition_to(NodeStatus::Failed));
        assert!(NodeStatus::Running.can_transition_to(NodeStatus::ErrorLoop));
        assert!(!NodeStatus::Idle.can_transition_to(NodeStatus::Completed));
    }

    #[test]
    fn test_error_loop_reachable_from_live_states() {
        for from in [
            NodeStatus::Idle,
            NodeStatus::Running,
            NodeStatus::Completed,
            NodeStatus::Failed,
        ] {
            assert!(from.can_transition_to(NodeStatus::ErrorLoop));
        }
        assert!(!NodeStatus::ErrorLoop.can_transition_to(NodeStatus::ErrorLoop));
        assert!(NodeStatus::ErrorLoop.can_transition_to(NodeStatus::Terminated));
        assert!(!NodeStatus::ErrorLoop.can_transition_to(NodeStatus::Running));
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&NodeStatus::ErrorLoop).unwrap();
        assert_eq!(json, "\"error_loop\"");
        let kind: NodeKind = serde_json::from_str("\"coordinator\"").unwrap();
        assert_eq!(kind, NodeKind::Coordinator);
    }
}
