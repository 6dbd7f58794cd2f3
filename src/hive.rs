//! Hive：集群共享依赖（Oracle + 持久化网关）与根节点工厂
//!
//! 所有节点共享同一个 Oracle 与 PersistenceGateway；Hive 克隆开销很小。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::NodeKind;
use crate::llm::create_llm_from_config;
use crate::node::{AgentNode, NodeConfig};
use crate::oracle::{LlmOracle, ReasoningOracle};
use crate::persistence::{JsonFileStore, MemoryStore, PersistenceGateway};

#[derive(Clone)]
pub struct Hive {
    oracle: Arc<dyn ReasoningOracle>,
    store: Arc<dyn PersistenceGateway>,
}

impl Hive {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, store: Arc<dyn PersistenceGateway>) -> Self {
        Self { oracle, store }
    }

    /// 使用内存存储
    pub fn in_memory(oracle: Arc<dyn ReasoningOracle>) -> Self {
        Self::new(oracle, Arc::new(MemoryStore::new()))
    }

    /// 按配置组装：设置了 app.data_dir 则用 JSON 文件存储，Oracle 由 [llm] 段决定
    pub fn from_config(config: &AppConfig) -> Self {
        let llm = create_llm_from_config(&config.llm);
        let oracle: Arc<dyn ReasoningOracle> = Arc::new(LlmOracle::new(llm));
        let store: Arc<dyn PersistenceGateway> = match &config.app.data_dir {
            Some(dir) => {
                tracing::info!(data_dir = %dir.display(), "Using JSON file store");
                Arc::new(JsonFileStore::new(dir))
            }
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(oracle, store)
    }

    pub fn oracle(&self) -> &Arc<dyn ReasoningOracle> {
        &self.oracle
    }

    pub fn store(&self) -> &Arc<dyn PersistenceGateway> {
        &self.store
    }

    /// 创建根 Coordinator（未初始化，调用方需 `initialize`）
    pub fn create_root_node(&self, name: impl Into<String>, config: NodeConfig) -> AgentNode {
        AgentNode::new(self.clone(), name, NodeKind::Coordinator, None, config)
    }

    /// 创建独立的 Worker（没有父节点）
    pub fn create_worker(&self, name: impl Into<String>, config: NodeConfig) -> AgentNode {
        AgentNode::new(self.clone(), name, NodeKind::Worker, None, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_from_config_uses_file_store_when_data_dir_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.llm.provider = "mock".to_string();
        config.app.data_dir = Some(dir.path().to_path_buf());

        let hive = Hive::from_config(&config);
        let root = hive.create_root_node("root", NodeConfig::default().without_monitor());
        root.initialize().await;

        assert!(dir.path().join(format!("{}.json", root.id())).exists());
        assert!(root.id().starts_with("coordinator_"));
    }
}
