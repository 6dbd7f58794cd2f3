//! 按配置选择 LLM 后端
//!
//! DeepSeek 提供与 OpenAI 完全兼容的接口（Base URL: https://api.deepseek.com），
//! 故两者共用 OpenAiClient；没有 API Key 或 provider = "mock" 时退回 MockLlmClient。

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 创建 DeepSeek 客户端：优先 `DEEPSEEK_API_KEY`，模型取参数或 `DEEPSEEK_MODEL`
pub fn create_deepseek_client(model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, Some(api_key.as_str()))
}

/// 根据 [llm] 段与环境变量选择后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(llm: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient);
    }

    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if use_deepseek {
        let model = llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(Some(&model)))
    } else if use_openai {
        let model = llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[tokio::test]
    async fn test_mock_provider_is_honored() {
        let section = LlmSection {
            provider: "mock".to_string(),
            ..LlmSection::default()
        };
        let client = create_llm_from_config(&section);
        let reply = client
            .complete(&[Message::user("[self_test]\nanything")])
            .await
            .unwrap();
        assert!(reply.contains("\"passed\":true"));
    }
}
