//! 核心层：节点状态机、错误类型、错误循环恢复策略

pub mod error;
pub mod recovery;
pub mod state;

pub use error::HiveError;
pub use recovery::{RecoveryAction, RecoveryAttempts, RecoveryEngine};
pub use state::{NodeKind, NodeStatus};
