//! hive 命令行入口
//!
//! 用法：`hive [--config PATH] <task text...>`
//! 创建根 Coordinator 执行任务，结果以 JSON 打印到 stdout；失败时以非零状态退出。

use std::path::PathBuf;

use anyhow::{bail, Context};
use hive::{config::load_config, observability, Hive, NodeConfig, Task};
use serde_json::json;

struct Args {
    config: Option<PathBuf>,
    task: String,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut config = None;
    let mut words = Vec::new();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().context("--config requires a path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                bail!("usage: hive [--config PATH] <task text...>");
            }
            _ => words.push(arg),
        }
    }
    let task = words.join(" ");
    if task.trim().is_empty() {
        bail!("usage: hive [--config PATH] <task text...>");
    }
    Ok(Args { config, task })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let cfg = load_config(args.config).context("Failed to load config")?;
    observability::init_with_format(&cfg.log.format);

    let hive = Hive::from_config(&cfg);
    let root = hive.create_root_node(cfg.app.name.clone(), NodeConfig::from(&cfg.node));
    root.initialize().await;

    let result = root.execute_task(Task::new(args.task)).await;
    let tree = root.tree().await;
    root.terminate("run finished").await;

    let report = json!({ "result": result, "tree": tree });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize result")?
    );

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
