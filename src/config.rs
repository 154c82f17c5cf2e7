//! 配置模块
//!
//! 支持从 JSON 文件加载系统配置，关键凭据可由环境变量覆盖

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 工作线程数（0 表示使用 CPU 核心数）
    #[serde(default)]
    pub workers: usize,
}

/// JSON API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// 访问密钥（为空则不启用认证）
    #[serde(default)]
    pub access_key: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Gemini 模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API Key（为空时调用阶段失败）
    #[serde(default)]
    pub api_key: String,
    /// 模型名称
    #[serde(default = "default_model")]
    pub model: String,
    /// 接口根地址
    #[serde(default = "default_gemini_base")]
    pub api_base: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
    /// 连接超时时间（秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// 单次报告允许的最大工具调用轮数
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

/// 股票目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// 目录页面地址
    #[serde(default = "default_directory_url")]
    pub source_url: String,
    /// 缓存有效期（秒），0 表示进程生命周期内不过期
    #[serde(default)]
    pub cache_ttl_secs: u64,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// 抓取失败后的退避时间（秒），期间直接返回不可用
    #[serde(default = "default_failure_backoff")]
    pub failure_backoff_secs: u64,
}

/// 行情数据配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Yahoo Finance 接口根地址
    #[serde(default = "default_market_base")]
    pub api_base: String,
    /// Cookie 握手地址
    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// 对比报告配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// 单次对比的总超时时间（秒）
    #[serde(default = "default_report_timeout")]
    pub timeout_secs: u64,
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// API 配置
    #[serde(default)]
    pub api: ApiConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
    /// 模型配置
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// 目录配置
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// 行情配置
    #[serde(default)]
    pub market: MarketConfig,
    /// 报告配置
    #[serde(default)]
    pub report: ReportConfig,
}

/// 配置来源，日志系统初始化后再输出
#[derive(Debug)]
pub enum ConfigOrigin {
    File(PathBuf),
    Invalid(PathBuf, String),
    Defaults,
}

// 默认值函数
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_timeout() -> u64 { 30 }
fn default_connect_timeout() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_gemini_base() -> String { "https://generativelanguage.googleapis.com/v1beta".to_string() }
fn default_gemini_timeout() -> u64 { 120 }
fn default_max_tool_rounds() -> usize { 6 }
fn default_directory_url() -> String {
    "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies".to_string()
}
fn default_failure_backoff() -> u64 { 60 }
fn default_market_base() -> String { "https://query2.finance.yahoo.com".to_string() }
fn default_cookie_url() -> String { "https://fc.yahoo.com".to_string() }
fn default_report_timeout() -> u64 { 300 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: 0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            api_base: default_gemini_base(),
            timeout_secs: default_gemini_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            source_url: default_directory_url(),
            cache_ttl_secs: 0,
            timeout_secs: default_timeout(),
            failure_backoff_secs: default_failure_backoff(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_base: default_market_base(),
            cookie_url: default_cookie_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_report_timeout(),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 加载配置，优先从文件，失败则使用默认值，最后应用环境变量覆盖
    pub fn load() -> (Self, ConfigOrigin) {
        let config_paths = ["config.json", "config/config.json"];
        let mut origin = ConfigOrigin::Defaults;
        let mut config = Self::default();

        for path in config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(loaded) => {
                        config = loaded;
                        origin = ConfigOrigin::File(PathBuf::from(path));
                        break;
                    }
                    Err(e) => {
                        origin = ConfigOrigin::Invalid(PathBuf::from(path), e.to_string());
                    }
                }
            }
        }

        config.apply_env(|key| env::var(key).ok());
        (config, origin)
    }

    /// 环境变量覆盖：GOOGLE_API_KEY、GEMINI_MODEL、API_KEY
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|v| !v.is_empty()) {
            self.gemini.api_key = key;
        }
        if let Some(model) = lookup("GEMINI_MODEL").filter(|v| !v.is_empty()) {
            self.gemini.model = model;
        }
        if let Some(key) = lookup("API_KEY").filter(|v| !v.is_empty()) {
            self.api.access_key = key;
        }
    }

    /// 获取服务器绑定地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
