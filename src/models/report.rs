//! 对比报告数据模型
//!
//! 一次用户交互内的输入、分析请求、分析结果以及最终结果状态

use serde::{Deserialize, Serialize};

/// 用户输入的两个股票代码
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerQuery {
    /// 第一个股票代码
    #[serde(default)]
    pub first_symbol: Option<String>,
    /// 第二个股票代码
    #[serde(default)]
    pub second_symbol: Option<String>,
}

impl TickerQuery {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first_symbol: Some(first.into()),
            second_symbol: Some(second.into()),
        }
    }

    /// 第一个代码（非空时）
    pub fn first(&self) -> Option<&str> {
        present(&self.first_symbol)
    }

    /// 第二个代码（非空时）
    pub fn second(&self) -> Option<&str> {
        present(&self.second_symbol)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// 根据当前输入推导出的状态，每次交互重新计算
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputState {
    /// 未输入
    Idle,
    /// 只输入了一个代码
    Incomplete,
    /// 两个代码均已输入
    Ready { first: String, second: String },
}

/// 发送给分析服务的自然语言指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalystRequest {
    pub instruction: String,
}

impl AnalystRequest {
    /// 构造两只股票的对比指令，代码原样代入
    pub fn compare(first: &str, second: &str) -> Self {
        Self {
            instruction: format!(
                "Compare both the stocks - {} and {} and make a detailed report for an investor trying to choose between them.",
                first, second
            ),
        }
    }
}

/// 分析过程中的一次工具调用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// 工具名称
    pub name: String,
    /// 调用参数
    pub args: serde_json::Value,
    /// 是否成功
    pub ok: bool,
}

/// 分析服务的返回结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystResponse {
    /// Markdown 格式的报告正文
    pub content: String,
    /// 实际使用的模型
    pub model: Option<String>,
    /// 工具调用记录
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
}

/// 已完成的对比报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub first: String,
    pub second: String,
    /// 报告标题
    pub title: String,
    /// 报告正文（未经处理的 Markdown）
    pub content: String,
}

impl ComparisonReport {
    pub fn new(first: &str, second: &str, content: String) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            title: format!("📊 Comparison Report: {} vs {}", first, second),
            content,
        }
    }
}

/// 一次交互的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Idle,
    Incomplete { warning: String },
    Completed(ComparisonReport),
    Failed { message: String },
}

impl ComparisonOutcome {
    pub fn report(&self) -> Option<&ComparisonReport> {
        match self {
            ComparisonOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}
