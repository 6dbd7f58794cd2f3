//! 持久化网关（PersistenceGateway）
//!
//! 节点快照按节点 id 存储（id 可以是层级路径，如 "root/child-a/grandchild-1"）；
//! 对话历史与执行日志两个日志型字段提供 append 辅助方法。不支持跨 key 事务。
//!
//! 实现：MemoryStore（内存）、JsonFileStore（每个 key 一个 JSON 文件）、
//! SqliteStore（需启用 `async-sqlite` feature）。

pub mod file;
pub mod memory;
#[cfg(feature = "async-sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteStore;

/// 记录中对话历史字段的路径
pub const CONVERSATION_PATH: [&str; 2] = ["context", "conversation_history"];
/// 记录中执行日志字段的路径
pub const EXECUTION_LOG_PATH: [&str; 2] = ["context", "execution_log"];

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// 子节点向父节点汇报结果时使用的 key（fire-and-forget，不会被同步读取）
pub fn child_result_key(parent_id: &str, child_id: &str) -> String {
    format!("{parent_id}/results/{child_id}")
}

/// 持久化后端 trait：每个节点只读写自己的 key
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn put(&self, key: &str, record: Value) -> Result<(), PersistenceError>;

    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;

    async fn delete(&self, key: &str) -> Result<(), PersistenceError>;

    async fn list_keys(&self) -> Result<Vec<String>, PersistenceError>;

    /// 向记录中 path 指向的数组追加一项；中间对象不存在时自动创建
    async fn append_to(
        &self,
        key: &str,
        path: &[&str],
        entry: Value,
    ) -> Result<(), PersistenceError> {
        let mut record = self
            .get(key)
            .await?
            .unwrap_or_else(|| Value::Object(Default::default()));
        push_at_path(&mut record, path, entry)?;
        self.put(key, record).await
    }

    async fn append_conversation(&self, key: &str, entry: Value) -> Result<(), PersistenceError> {
        self.append_to(key, &CONVERSATION_PATH, entry).await
    }

    async fn append_execution_log(&self, key: &str, entry: Value) -> Result<(), PersistenceError> {
        self.append_to(key, &EXECUTION_LOG_PATH, entry).await
    }
}

fn push_at_path(record: &mut Value, path: &[&str], entry: Value) -> Result<(), PersistenceError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(PersistenceError::Backend("empty append path".to_string()));
    };

    let mut cursor = record;
    for segment in parents {
        let obj = cursor
            .as_object_mut()
            .ok_or_else(|| PersistenceError::Backend(format!("'{segment}' parent is not an object")))?;
        cursor = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }

    let obj = cursor
        .as_object_mut()
        .ok_or_else(|| PersistenceError::Backend(format!("'{last}' parent is not an object")))?;
    let slot = obj
        .entry(last.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match slot {
        Value::Array(items) => {
            items.push(entry);
            Ok(())
        }
        _ => Err(PersistenceError::Backend(format!("'{last}' is not an array"))),
    }
}
