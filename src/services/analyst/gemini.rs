//! Gemini 分析服务
//!
//! 调用 generateContent 接口，并把模型发起的函数调用转发给行情数据服务，
//! 直到模型给出最终文本或超过允许的轮数

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{system_prompt, AnalystService};
use crate::config::GeminiConfig;
use crate::error::AppError;
use crate::models::{AnalystRequest, AnalystResponse, ToolCallRecord};
use crate::services::market_data::{MarketData, MarketTool};

// ==================== 接口数据结构 ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    fn system(text: String) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// 拼接所有非思考过程的文本
    fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn function_calls(&self) -> Vec<FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// 思考过程片段，回传时保留标记
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    /// 思考签名，多轮工具调用时需原样回传
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }

    fn function_response(name: String, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse { name, response }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclaration {
    name: &'static str,
    description: &'static str,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: &'a Content,
    contents: &'a [Content],
    tools: &'a [ToolSet],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// 取第一个候选结果，处理拦截与空结果
    fn into_content(self) -> Result<(Content, Option<String>), AppError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::service(format!("请求被模型拦截: {}", reason)));
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::service("模型未返回候选结果"))?;

        match candidate.content {
            Some(content) if !content.parts.is_empty() => Ok((content, self.model_version)),
            _ => Err(AppError::service(format!(
                "模型返回空内容 (finishReason={})",
                candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string())
            ))),
        }
    }
}

fn tool_declarations() -> Vec<ToolSet> {
    let declarations = MarketTool::ALL
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name(),
            description: tool.description(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "The stock ticker symbol, e.g. AAPL."
                    }
                },
                "required": ["symbol"]
            }),
        })
        .collect();

    vec![ToolSet {
        function_declarations: declarations,
    }]
}

/// 从错误响应中提取可读信息
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// ==================== 服务实现 ====================

/// 基于 Gemini 的分析服务
pub struct GeminiAnalyst {
    client: Client,
    config: GeminiConfig,
    market: Arc<dyn MarketData>,
    system_instruction: Content,
    tools: Vec<ToolSet>,
}

impl GeminiAnalyst {
    pub fn new(config: GeminiConfig, market: Arc<dyn MarketData>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            market,
            system_instruction: Content::system(system_prompt()),
            tools: tool_declarations(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, contents: &[Content]) -> Result<GenerateResponse, AppError> {
        let body = GenerateRequest {
            system_instruction: &self.system_instruction,
            contents,
            tools: &self.tools,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(AppError::service(format!(
                "Gemini 返回 {}: {}",
                status,
                error_message(&text)
            )));
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// 执行一次函数调用，错误以 `{ "error": ... }` 的形式交还给模型
    async fn dispatch(&self, call: &FunctionCall) -> (Value, bool) {
        let Some(tool) = MarketTool::from_name(&call.name) else {
            return (json!({ "error": format!("unknown function: {}", call.name) }), false);
        };
        let Some(symbol) = call.args["symbol"].as_str() else {
            return (json!({ "error": "missing required argument: symbol" }), false);
        };

        match self.market.lookup(tool, symbol).await {
            Ok(data) => (json!({ "symbol": symbol, "data": data }), true),
            Err(e) => {
                log::warn!("工具 {}({}) 调用失败: {}", call.name, symbol, e);
                (json!({ "symbol": symbol, "error": e.to_string() }), false)
            }
        }
    }
}

#[async_trait]
impl AnalystService for GeminiAnalyst {
    async fn run(&self, request: &AnalystRequest) -> Result<AnalystResponse, AppError> {
        if self.config.api_key.is_empty() {
            return Err(AppError::ConfigurationMissing(
                "未设置 GOOGLE_API_KEY".to_string(),
            ));
        }

        let max_rounds = self.config.max_tool_rounds;
        let mut contents = vec![Content::user(vec![Part::text(request.instruction.clone())])];
        let mut tool_calls = Vec::new();

        for round in 0..=max_rounds {
            let (content, model_version) = self.generate(&contents).await?.into_content()?;
            let calls = content.function_calls();

            if calls.is_empty() {
                let text = content.text();
                if text.trim().is_empty() {
                    return Err(AppError::service("模型返回空文本"));
                }
                return Ok(AnalystResponse {
                    content: text,
                    model: model_version.or_else(|| Some(self.config.model.clone())),
                    tool_calls,
                });
            }

            if round == max_rounds {
                break;
            }

            contents.push(Content {
                role: Some("model".to_string()),
                parts: content.parts,
            });

            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                log::info!("🔧 工具调用: {}({})", call.name, call.args);
                let (response, ok) = self.dispatch(&call).await;
                tool_calls.push(ToolCallRecord {
                    name: call.name.clone(),
                    args: call.args.clone(),
                    ok,
                });
                responses.push(Part::function_response(call.name, response));
            }
            contents.push(Content::user(responses));
        }

        Err(AppError::service(format!("工具调用超过 {} 轮", max_rounds)))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
