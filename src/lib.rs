//! Hive - 自组织的层级智能体集群
//!
//! 根 Coordinator 把任务分解为有序子任务，逐个分派给只看到隔离上下文的 Worker；
//! Worker 执行后自测，结果逐层汇总。每个节点都有 Monitor 检测错误循环与超时，
//! 陷入错误循环的 Worker 会以新身份重建后重试一次。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 节点状态机、错误类型、恢复策略
//! - **node**: AgentNode、任务与上下文类型
//! - **coordinator** / **worker**: 两种角色的执行逻辑
//! - **monitor**: 周期巡检与事件缓冲
//! - **oracle**: 推理能力抽象（LLM 实现 / 脚本化实现）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **persistence**: 节点快照存储（内存 / JSON 文件 / SQLite）
//! - **hive**: 共享依赖与根节点工厂

pub mod config;
pub mod coordinator;
pub mod core;
pub mod hive;
pub mod llm;
pub mod monitor;
pub mod node;
pub mod observability;
pub mod oracle;
pub mod persistence;
pub mod worker;

pub use coordinator::{aggregate_results, AggregateSummary};
pub use core::{HiveError, NodeKind, NodeStatus};
pub use hive::Hive;
pub use monitor::{Monitor, MonitorEvent, MonitorEventKind};
pub use node::{AgentNode, NodeConfig, NodeRecord, NodeTree, Task, TaskContext, TaskResult};
