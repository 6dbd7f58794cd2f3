//! 可观测性：tracing 日志初始化
//!
//! 默认级别 info，可通过 RUST_LOG 覆盖；`init_json` 输出结构化 JSON 日志。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 人类可读的文本日志（输出到 stderr，stdout 留给结果）
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// JSON 日志
pub fn init_json() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .try_init();
}

/// 按 [log] format 选择日志格式
pub fn init_with_format(format: &str) {
    if format.eq_ignore_ascii_case("json") {
        init_json();
    } else {
        init();
    }
}
