//! JSON 接口处理器
//!
//! ## API 列表
//! - GET /tickers?search= - 获取（过滤后的）股票目录
//! - POST /compare - 对比两只股票并返回报告

use actix_web::{web, HttpResponse, Result};

use crate::models::{
    ApiResponse, ComparisonOutcome, ComparisonReport, DirectoryQuery, DirectorySnapshot,
    TickerQuery,
};
use crate::services::directory;
use crate::state::AppContext;

/// 获取股票目录
///
/// GET /api/v1/tickers
///
/// # 参数
/// - search: 搜索关键字，不区分大小写
pub async fn list_tickers(
    ctx: web::Data<AppContext>,
    query: web::Query<DirectoryQuery>,
) -> Result<HttpResponse> {
    match ctx.directory.load_directory().await {
        Ok(snapshot) => {
            let search = query.search.as_deref().unwrap_or("");
            let response = ApiResponse::success(directory::filter(search, &snapshot));
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            log::warn!("{}", e);
            let response = ApiResponse::<DirectorySnapshot>::error("Ticker directory is unavailable");
            Ok(HttpResponse::ServiceUnavailable().json(response))
        }
    }
}

/// 对比两只股票
///
/// POST /api/v1/compare
///
/// 请求体: `{"first_symbol": "AAPL", "second_symbol": "MSFT"}`
pub async fn compare(
    ctx: web::Data<AppContext>,
    body: web::Json<TickerQuery>,
) -> Result<HttpResponse> {
    let outcome = ctx.orchestrator.compare(&body).await;

    Ok(match outcome {
        ComparisonOutcome::Completed(report) => {
            HttpResponse::Ok().json(ApiResponse::success(report))
        }
        ComparisonOutcome::Incomplete { warning } => HttpResponse::UnprocessableEntity()
            .json(ApiResponse::<ComparisonReport>::error(warning)),
        ComparisonOutcome::Idle => HttpResponse::BadRequest()
            .json(ApiResponse::<ComparisonReport>::error("No stock symbols provided.")),
        ComparisonOutcome::Failed { message } => {
            HttpResponse::BadGateway().json(ApiResponse::<ComparisonReport>::error(message))
        }
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/tickers", web::get().to(list_tickers))
        .route("/compare", web::post().to(compare));
}
