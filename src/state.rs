//! 应用上下文
//!
//! 进程启动时构建一次，通过 `web::Data` 共享给所有请求

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::AppConfig;
use crate::services::analyst::{AnalystService, GeminiAnalyst};
use crate::services::directory::DirectoryLoader;
use crate::services::market_data::MarketDataService;
use crate::services::orchestrator::ReportOrchestrator;

pub struct AppContext {
    pub directory: DirectoryLoader,
    pub orchestrator: ReportOrchestrator,
}

impl AppContext {
    pub fn new(directory: DirectoryLoader, analyst: Arc<dyn AnalystService>, timeout: Duration) -> Self {
        Self {
            directory,
            orchestrator: ReportOrchestrator::new(analyst, timeout),
        }
    }

    /// 按配置构建生产环境上下文
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let market = Arc::new(MarketDataService::new(&config.market)?);
        let analyst = Arc::new(GeminiAnalyst::new(config.gemini.clone(), market)?);
        let directory = DirectoryLoader::from_config(&config.directory)?;

        if config.gemini.api_key.is_empty() {
            log::warn!("未设置 GOOGLE_API_KEY，对比请求将失败");
        }

        Ok(Self::new(
            directory,
            analyst,
            Duration::from_secs(config.report.timeout_secs),
        ))
    }
}
