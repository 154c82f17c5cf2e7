//! 错误类型定义
//!
//! 所有错误在编排层边界被转换为用户可见状态，不会向进程层面传播

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// 只输入了一个股票代码
    #[error("Please enter both stock symbols.")]
    IncompleteInput,

    /// 股票目录获取或解析失败
    #[error("股票目录不可用: {0}")]
    DataUnavailable(String),

    /// 分析服务调用失败（网络、鉴权、响应格式等）
    #[error("分析服务调用失败: {0}")]
    ServiceFailure(String),

    /// 缺少必要的凭据
    #[error("缺少配置: {0}")]
    ConfigurationMissing(String),
}

impl AppError {
    pub fn data_unavailable(err: impl std::fmt::Display) -> Self {
        Self::DataUnavailable(err.to_string())
    }

    pub fn service(err: impl std::fmt::Display) -> Self {
        Self::ServiceFailure(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::ServiceFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::ServiceFailure(format!("响应解析失败: {}", err))
    }
}
