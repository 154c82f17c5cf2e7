//! AI 投资分析服务
//!
//! 输入两个股票代码，由 Gemini 结合实时行情生成对比报告
//! 数据来源：Yahoo Finance、维基百科 S&P 500 成分股列表

mod config;     // 配置
mod error;      // 错误类型
mod handlers;   // HTTP 请求处理器
mod middleware; // 中间件
mod models;     // 数据模型定义
mod services;   // 业务逻辑服务
mod state;      // 应用上下文
mod views;      // 页面渲染

#[cfg(test)]
mod testing;

use actix_web::{web, App, HttpServer, middleware::Logger};
use env_logger::Env;

use crate::config::{AppConfig, ConfigOrigin};
use crate::middleware::ApiKeyMiddleware;
use crate::state::AppContext;

/// 应用程序入口
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let (config, origin) = AppConfig::load();

    // 初始化日志系统，默认级别取自配置
    env_logger::init_from_env(Env::default().default_filter_or(config.log.level.as_str()));

    match origin {
        ConfigOrigin::File(path) => log::info!("从 {} 加载配置成功", path.display()),
        ConfigOrigin::Invalid(path, e) => log::warn!("加载配置文件 {} 失败: {}，使用默认配置", path.display(), e),
        ConfigOrigin::Defaults => log::info!("使用默认配置"),
    }

    if config.api.access_key.is_empty() {
        log::warn!("未设置 API_KEY，JSON 接口不启用认证");
    }

    let context = AppContext::from_config(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let context = web::Data::new(context);
    let access_key = config.api.access_key.clone();

    log::info!("启动 AI 投资分析服务，监听 {}", config.bind_addr());

    // 创建并启动 HTTP 服务器
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())  // 添加请求日志中间件
            .wrap(ApiKeyMiddleware::new(access_key.clone()))  // API Key 认证
            .app_data(context.clone())
            .configure(handlers::config)  // 配置路由
    });

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    server.bind(config.bind_addr())?.run().await
}
