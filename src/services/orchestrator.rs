//! 对比报告编排
//!
//! 每次交互都从当前输入重新推导状态：两个代码都有时才调用一次分析服务，
//! 所有错误在这里转换为用户可见的结果

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::models::{
    AnalystRequest, ComparisonOutcome, ComparisonReport, InputState, TickerQuery,
};
use crate::services::analyst::AnalystService;

/// 分析失败时展示给用户的通用提示
pub const FAILURE_MESSAGE: &str = "Failed to generate the comparison report. Please try again.";

/// 根据输入推导状态
pub fn classify(query: &TickerQuery) -> InputState {
    match (query.first(), query.second()) {
        (Some(first), Some(second)) => InputState::Ready {
            first: first.to_string(),
            second: second.to_string(),
        },
        (None, None) => InputState::Idle,
        _ => InputState::Incomplete,
    }
}

/// 报告编排器
pub struct ReportOrchestrator {
    analyst: Arc<dyn AnalystService>,
    timeout: Duration,
}

impl ReportOrchestrator {
    pub fn new(analyst: Arc<dyn AnalystService>, timeout: Duration) -> Self {
        Self { analyst, timeout }
    }

    /// 执行一次对比
    pub async fn compare(&self, query: &TickerQuery) -> ComparisonOutcome {
        self.compare_until(query, std::future::pending()).await
    }

    /// 执行一次对比，`cancelled` 完成时放弃等待分析结果
    pub async fn compare_until<C>(&self, query: &TickerQuery, cancelled: C) -> ComparisonOutcome
    where
        C: Future<Output = ()>,
    {
        let (first, second) = match classify(query) {
            InputState::Idle => return ComparisonOutcome::Idle,
            InputState::Incomplete => {
                return ComparisonOutcome::Incomplete {
                    warning: AppError::IncompleteInput.to_string(),
                }
            }
            InputState::Ready { first, second } => (first, second),
        };

        let request = AnalystRequest::compare(&first, &second);
        log::info!(
            "开始分析 {} 与 {} (service={})",
            first,
            second,
            self.analyst.name()
        );

        let result = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.analyst.run(&request)) => {
                result.unwrap_or_else(|_| {
                    Err(AppError::service(format!("分析超时 ({}s)", self.timeout.as_secs())))
                })
            }
            _ = cancelled => Err(AppError::service("分析已取消")),
        };

        match result {
            Ok(response) => {
                log::info!(
                    "分析完成: {} vs {}，{} 次工具调用，模型 {}",
                    first,
                    second,
                    response.tool_calls.len(),
                    response.model.as_deref().unwrap_or("-")
                );
                ComparisonOutcome::Completed(ComparisonReport::new(&first, &second, response.content))
            }
            Err(e) => {
                log::error!("分析 {} 与 {} 失败: {}", first, second, e);
                ComparisonOutcome::Failed {
                    message: FAILURE_MESSAGE.to_string(),
                }
            }
        }
    }
}
