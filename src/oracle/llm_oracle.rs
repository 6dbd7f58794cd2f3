//! LlmOracle：在 LlmClient 之上实现 ReasoningOracle
//!
//! 每个阶段拼一条 prompt（首行为阶段标记），要求 LLM 只输出 JSON；
//! extract_json 从回复中提取 JSON（```json ... ``` 或最外层 {...} / [...]）后反序列化。
//! 回复格式错误时返回 OracleError::Parse，由节点走兜底逻辑，这里不做修复。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm::{LlmClient, Message};
use crate::node::TaskContext;
use crate::oracle::{
    ExecutionOutcome, OracleError, PlannedSubtask, ReasoningOracle, SelfTestVerdict,
};

const DEFAULT_SYSTEM_PROMPT: &str = "You are one node of a hierarchical agent swarm. \
Follow the requested output format exactly and reply with a single JSON value only.";

/// 从 LLM 文本中提取 JSON 片段；找不到时返回 None
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }

    let open = trimmed.find(['{', '['])?;
    let close_char = if trimmed[open..].starts_with('{') { '}' } else { ']' };
    let close = trimmed.rfind(close_char)?;
    if close < open {
        return None;
    }
    Some(&trimmed[open..=close])
}

#[derive(Deserialize)]
struct DecomposeReply {
    subtasks: Vec<PlannedSubtask>,
}

/// 基于 LLM 的 Oracle：持有 LLM 与 system prompt
pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    async fn ask(&self, prompt: String) -> Result<String, OracleError> {
        let messages = vec![Message::system(self.system_prompt.clone()), Message::user(prompt)];
        self.llm.complete(&messages).await.map_err(OracleError::Llm)
    }

    fn parse<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
        let json = extract_json(raw).ok_or_else(|| OracleError::Parse(truncate(raw)))?;
        serde_json::from_str(json).map_err(|e| OracleError::Parse(format!("{e}: {}", truncate(json))))
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 200;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[async_trait]
impl ReasoningOracle for LlmOracle {
    async fn decompose(&self, task_text: &str) -> Result<Vec<PlannedSubtask>, OracleError> {
        let prompt = format!(
            "[decompose]\n{task_text}\n\n\
             Break the task above into a short ordered list of independent subtasks.\n\
             Respond with JSON: {{\"subtasks\": [{{\"id\": \"...\", \"description\": \"...\", \
             \"priority\": 1-10, \"dependencies\": [\"id\", ...]}}]}}"
        );
        let raw = self.ask(prompt).await?;
        let reply: DecomposeReply = Self::parse(&raw)?;
        Ok(reply
            .subtasks
            .into_iter()
            .map(|s| {
                let priority = s.priority;
                s.with_priority(priority)
            })
            .collect())
    }

    async fn execute(
        &self,
        instruction: &str,
        context: Option<&TaskContext>,
    ) -> Result<ExecutionOutcome, OracleError> {
        let context_section = match context {
            Some(ctx) => format!(
                "\n\nContext: {}",
                serde_json::to_string(ctx).map_err(|e| OracleError::Parse(e.to_string()))?
            ),
            None => String::new(),
        };
        let prompt = format!(
            "[execute]\n{instruction}{context_section}\n\n\
             Carry out the instruction. Respond with JSON: \
             {{\"success\": true|false, \"output\": \"...\", \"reasoning\": \"...\"}}"
        );
        let raw = self.ask(prompt).await?;

        // 纯文本回复视为直接给出的结果
        if extract_json(&raw).is_none() {
            return Ok(ExecutionOutcome::ok(raw.trim()));
        }
        Self::parse(&raw)
    }

    async fn self_test(
        &self,
        task_text: &str,
        produced_output: &str,
    ) -> Result<SelfTestVerdict, OracleError> {
        let prompt = format!(
            "[self_test]\n{task_text}\n\nProduced output:\n{produced_output}\n\n\
             Does the output fully accomplish the task? Respond with JSON: \
             {{\"passed\": true|false, \"feedback\": \"...\"}}"
        );
        let raw = self.ask(prompt).await?;
        Self::parse(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    struct FixedLlm(&'static str);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenLlm;

    #[async_trait]
    impl LlmClient for BrokenLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            Err("connection refused".to_string())
        }
    }

    #[test]
    fn test_extract_json_fenced() {
        let raw = "Sure!\n```json\n{\"passed\": true}\n```\nbye";
        assert_eq!(extract_json(raw), Some("{\"passed\": true}"));
    }

    #[test]
    fn test_extract_json_bare_object() {
        let raw = "result: {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_json_none() {
        assert_eq!(extract_json("just words"), None);
    }

    #[tokio::test]
    async fn test_decompose_with_mock() {
        let oracle = LlmOracle::new(Arc::new(MockLlmClient));
        let plan = oracle.decompose("build X").await.unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan[0].description.contains("build X"));
    }

    #[tokio::test]
    async fn test_execute_plain_text_reply() {
        let oracle = LlmOracle::new(Arc::new(FixedLlm("The answer is 42.")));
        let outcome = oracle.execute("compute", None).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "The answer is 42.");
    }

    #[tokio::test]
    async fn test_self_test_malformed_is_parse_error() {
        let oracle = LlmOracle::new(Arc::new(FixedLlm("{\"passed\": maybe}")));
        let err = oracle.self_test("t", "o").await.unwrap_err();
        assert!(matches!(err, OracleError::Parse(_)));
    }

    #[tokio::test]
    async fn test_llm_error_is_surfaced() {
        let oracle = LlmOracle::new(Arc::new(BrokenLlm));
        let err = oracle.decompose("x").await.unwrap_err();
        assert!(matches!(err, OracleError::Llm(msg) if msg.contains("refused")));
    }
}
