//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 根据 LlmOracle prompt 首行的阶段标记（[decompose] / [execute] / [self_test]）
//! 返回固定格式的 JSON，便于本地跑通 分解 -> 执行 -> 自测 全流程。

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：按阶段标记回显固定 JSON
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// 取阶段标记之后的第一行非空内容，作为回显的任务文本
fn subject(prompt: &str) -> String {
    prompt
        .lines()
        .skip(1)
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .chars()
        .take(120)
        .collect()
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let prompt = last_user(messages);
        let text = subject(prompt);

        let reply = if prompt.starts_with("[decompose]") {
            serde_json::json!({
                "subtasks": [
                    { "id": "analyze", "description": format!("Analyze: {text}"), "priority": 8, "dependencies": [] },
                    { "id": "execute", "description": format!("Execute: {text}"), "priority": 6, "dependencies": ["analyze"] },
                    { "id": "verify", "description": format!("Verify: {text}"), "priority": 4, "dependencies": ["execute"] }
                ]
            })
        } else if prompt.starts_with("[self_test]") {
            serde_json::json!({ "passed": true, "feedback": "Mock self-test approved" })
        } else {
            serde_json::json!({
                "success": true,
                "output": format!("Mock result for: {text}"),
                "reasoning": "Echo from Mock"
            })
        };

        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_decompose_returns_three_steps() {
        let client = MockLlmClient;
        let reply = client
            .complete(&[Message::user("[decompose]\nbuild X")])
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["subtasks"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_execute_echoes_subject() {
        let client = MockLlmClient;
        let reply = client
            .complete(&[Message::user("[execute]\nwrite the report")])
            .await
            .unwrap();
        assert!(reply.contains("Mock result for: write the report"));
    }
}
