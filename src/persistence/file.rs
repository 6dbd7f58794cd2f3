//! JSON 文件存储
//!
//! 每个 key 对应 root 下的一个 JSON 文件；key 中的 `/` 映射为子目录，
//! 如 "root/results/w1" -> {root}/root/results/w1.json。父目录不存在时自动创建。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::persistence::{PersistenceError, PersistenceGateway};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// key -> 文件路径；拒绝空段与 `.` / `..`，防止逃逸出 root
    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        let segments: Vec<&str> = key.split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(PersistenceError::Backend(format!("invalid key: {key}")));
        }
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| PersistenceError::Backend(format!("invalid key: {key}")))?;

        let mut path = self.root.clone();
        path.extend(parents);
        path.push(format!("{last}.{EXTENSION}"));
        Ok(path)
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileStore {
    async fn put(&self, key: &str, record: Value) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, serde_json::to_string_pretty(&record)?).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, PersistenceError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut keys = Vec::new();
            for entry in walkdir::WalkDir::new(&root) {
                let entry = entry.map_err(|e| PersistenceError::Backend(e.to_string()))?;
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION)
                {
                    continue;
                }
                let Ok(rel) = path.with_extension("").strip_prefix(&root).map(Path::to_path_buf) else {
                    continue;
                };
                let key: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| PersistenceError::Backend(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_and_nested_keys() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.put("root", json!({"id": "root"})).await.unwrap();
        store
            .put("root/results/w1", json!({"success": true}))
            .await
            .unwrap();

        assert!(dir.path().join("root/results/w1.json").exists());
        assert_eq!(store.get("root").await.unwrap(), Some(json!({"id": "root"})));
        assert_eq!(
            store.list_keys().await.unwrap(),
            vec!["root".to_string(), "root/results/w1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_none_and_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert_eq!(store.get("nope").await.unwrap(), None);
        store.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.put("../evil", json!(1)).await.is_err());
        assert!(store.put("a//b", json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_append_execution_log() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .append_execution_log("n1", json!({"action": "execute", "result": "ok"}))
            .await
            .unwrap();
        let record = store.get("n1").await.unwrap().unwrap();
        assert_eq!(record["context"]["execution_log"][0]["result"], "ok");
    }
}
