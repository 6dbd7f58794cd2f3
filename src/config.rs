//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HIVE__*` 覆盖（双下划线表示嵌套，如 `HIVE__NODE__TIMEOUT_MS=60000`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::node::NodeConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub log: LogSection,
}

/// [app] 段：根 Coordinator 名称、持久化目录
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_root_name")]
    pub name: String,
    /// 设置后使用 JSON 文件存储节点快照，否则使用内存存储
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_root_name(),
            data_dir: None,
        }
    }
}

fn default_root_name() -> String {
    "root".to_string()
}

/// [node] 段：每个节点的持久配置（recreate 后保持不变）
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 单个任务的最长执行时间（毫秒），超时由 Monitor 终止节点
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_monitor_enabled")]
    pub monitor_enabled: bool,
    /// Monitor 巡检间隔（毫秒）
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
    /// 单次 Oracle 调用超时（毫秒）
    #[serde(default = "default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
    /// 连续相同错误达到该次数即视为错误循环
    #[serde(default = "default_error_loop_threshold")]
    pub error_loop_threshold: usize,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            monitor_enabled: default_monitor_enabled(),
            monitor_interval_ms: default_monitor_interval_ms(),
            oracle_timeout_ms: default_oracle_timeout_ms(),
            error_loop_threshold: default_error_loop_threshold(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    300_000
}

fn default_monitor_enabled() -> bool {
    true
}

fn default_monitor_interval_ms() -> u64 {
    5_000
}

fn default_oracle_timeout_ms() -> u64 {
    60_000
}

fn default_error_loop_threshold() -> usize {
    3
}

impl From<&NodeSection> for NodeConfig {
    fn from(section: &NodeSection) -> Self {
        NodeConfig {
            max_retries: section.max_retries,
            timeout_ms: section.timeout_ms,
            monitor_enabled: section.monitor_enabled,
            monitor_interval_ms: section.monitor_interval_ms,
            oracle_timeout_ms: section.oracle_timeout_ms,
            error_loop_threshold: section.error_loop_threshold.max(1),
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmModelSection,
    #[serde(default)]
    pub openai: LlmModelSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmModelSection::default(),
            openai: LlmModelSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmModelSection {
    pub model: Option<String>,
}

/// [log] 段：text（默认）或 json
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "text".to_string()
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.name, "root");
        assert_eq!(cfg.node.timeout_ms, 300_000);
        assert_eq!(cfg.node.monitor_interval_ms, 5_000);
        assert_eq!(cfg.node.error_loop_threshold, 3);
        assert!(cfg.node.monitor_enabled);
        assert_eq!(cfg.log.format, "text");
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hive.toml");
        std::fs::write(
            &path,
            "[app]\nname = \"planner\"\n\n[node]\ntimeout_ms = 1500\nmonitor_enabled = false\n\n[llm]\nprovider = \"mock\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.name, "planner");
        assert_eq!(cfg.node.timeout_ms, 1500);
        assert!(!cfg.node.monitor_enabled);
        // 未出现的键保持默认
        assert_eq!(cfg.node.max_retries, 3);
        assert_eq!(cfg.llm.provider, "mock");
    }

    #[test]
    fn test_node_config_from_section() {
        let section = NodeSection {
            error_loop_threshold: 0,
            ..NodeSection::default()
        };
        let node: NodeConfig = (&section).into();
        assert_eq!(node.error_loop_threshold, 1);
        assert_eq!(node.timeout_ms, section.timeout_ms);
    }
}
