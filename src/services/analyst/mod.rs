//! 对话式分析服务
//!
//! 编排层只依赖 [`AnalystService`]，模型推理与工具调用都封装在实现内部

mod gemini;

pub use gemini::GeminiAnalyst;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{AnalystRequest, AnalystResponse};

/// 分析师角色描述
pub const ANALYST_DESCRIPTION: &str = "You are an investment analyst that researches stock prices, analyst recommendations, and stock fundamentals.";

/// 分析师行为要求
pub const ANALYST_INSTRUCTIONS: &[&str] =
    &["Format your response using markdown and use tables to display data where possible."];

/// 分析服务
#[async_trait]
pub trait AnalystService: Send + Sync {
    /// 执行一次分析，可能长时间阻塞
    async fn run(&self, request: &AnalystRequest) -> Result<AnalystResponse, AppError>;

    /// 服务名称
    fn name(&self) -> &str;
}

/// 拼接系统提示词
pub fn system_prompt() -> String {
    let mut prompt = String::from(ANALYST_DESCRIPTION);
    prompt.push_str("\n\n<instructions>\n");
    for instruction in ANALYST_INSTRUCTIONS {
        prompt.push_str("- ");
        prompt.push_str(instruction);
        prompt.push('\n');
    }
    prompt.push_str("</instructions>");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_contains_role_and_instructions() {
        let prompt = system_prompt();
        assert!(prompt.starts_with(ANALYST_DESCRIPTION));
        assert!(prompt.contains("- Format your response using markdown"));
        assert!(prompt.ends_with("</instructions>"));
    }
}
