//! 页面处理器
//!
//! GET / 每次请求都根据查询参数重新推导状态并渲染完整页面

use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;

use crate::models::{TickerQuery, TickerRecord};
use crate::services::directory;
use crate::state::AppContext;
use crate::views::IndexPage;

/// 页面查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub first_symbol: Option<String>,
    pub second_symbol: Option<String>,
    pub search: Option<String>,
}

impl PageQuery {
    fn ticker_query(&self) -> TickerQuery {
        TickerQuery {
            first_symbol: self.first_symbol.clone(),
            second_symbol: self.second_symbol.clone(),
        }
    }
}

/// 加载并过滤目录，失败时返回 None，不影响对比流程
async fn directory_rows(ctx: &AppContext, search: &str) -> Option<Vec<TickerRecord>> {
    match ctx.directory.load_directory().await {
        Ok(snapshot) => Some(directory::filter(search, &snapshot).records),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

pub async fn index(
    ctx: web::Data<AppContext>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let search = query.search.clone().unwrap_or_default();
    let symbols = query.ticker_query();

    // 目录与对比互不依赖，同时进行
    let (rows, outcome) = tokio::join!(
        directory_rows(&ctx, &search),
        ctx.orchestrator.compare(&symbols)
    );

    match IndexPage::new(&symbols, &search, rows, &outcome).render() {
        Ok(html) => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(html)),
        Err(e) => {
            log::error!("页面渲染失败: {}", e);
            Ok(HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body("Failed to render page"))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::directory::DirectoryLoader;
    use crate::testing::{FakeAnalyst, StaticSource, DIRECTORY_HTML};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn context(analyst: Arc<FakeAnalyst>, source: Arc<StaticSource>) -> web::Data<AppContext> {
        web::Data::new(AppContext::new(
            DirectoryLoader::new(source, None),
            analyst,
            Duration::from_secs(5),
        ))
    }

    async fn get_page(ctx: web::Data<AppContext>, uri: &str) -> String {
        let app = test::init_service(App::new().app_data(ctx).configure(config)).await;
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn test_idle_page() {
        let analyst = FakeAnalyst::replying("unused");
        let html = get_page(context(analyst.clone(), StaticSource::ok(DIRECTORY_HTML)), "/").await;

        assert!(html.contains("AI Investment Agent"));
        assert!(html.contains("<td>MSFT</td>"));
        assert!(!html.contains("⚠️ Please enter both"));
        assert_eq!(analyst.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_incomplete_page() {
        let analyst = FakeAnalyst::replying("unused");
        let html = get_page(
            context(analyst.clone(), StaticSource::ok(DIRECTORY_HTML)),
            "/?first_symbol=AAPL&second_symbol=",
        )
        .await;

        assert!(html.contains("⚠️ Please enter both stock symbols."));
        assert_eq!(analyst.call_count(), 0);
    }

    #[actix_web::test]
    async fn test_completed_page() {
        let analyst = FakeAnalyst::replying("## Report...");
        let html = get_page(
            context(analyst.clone(), StaticSource::ok(DIRECTORY_HTML)),
            "/?first_symbol=AAPL&second_symbol=MSFT",
        )
        .await;

        assert!(html.contains("📊 Comparison Report: AAPL vs MSFT"));
        assert!(html.contains("<h2>Report...</h2>"));
        assert_eq!(analyst.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_search_filters_table() {
        let analyst = FakeAnalyst::replying("unused");
        let html = get_page(
            context(analyst, StaticSource::ok(DIRECTORY_HTML)),
            "/?search=aapl",
        )
        .await;

        assert!(html.contains("<td>AAPL</td>"));
        assert!(!html.contains("<td>MSFT</td>"));
        assert!(!html.contains("<td>MMM</td>"));
    }

    #[actix_web::test]
    async fn test_directory_failure_does_not_block_comparison() {
        let analyst = FakeAnalyst::replying("## Report...");
        let html = get_page(
            context(analyst.clone(), StaticSource::failing()),
            "/?first_symbol=AAPL&second_symbol=MSFT",
        )
        .await;

        assert!(html.contains("Ticker directory is currently unavailable."));
        assert!(html.contains("📊 Comparison Report: AAPL vs MSFT"));
        assert_eq!(analyst.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_slow_directory_runs_alongside_comparison() {
        let analyst = FakeAnalyst::slow(Duration::from_millis(300));
        let ctx = context(analyst.clone(), StaticSource::failing_after(Duration::from_millis(300)));

        let started = std::time::Instant::now();
        let html = get_page(ctx, "/?first_symbol=AAPL&second_symbol=MSFT").await;

        assert!(started.elapsed() < Duration::from_millis(550));
        assert!(html.contains("Ticker directory is currently unavailable."));
        assert!(html.contains("📊 Comparison Report: AAPL vs MSFT"));
        assert_eq!(analyst.call_count(), 1);
    }

    #[actix_web::test]
    async fn test_failed_page_has_no_report() {
        let analyst = FakeAnalyst::failing("boom");
        let html = get_page(
            context(analyst, StaticSource::ok(DIRECTORY_HTML)),
            "/?first_symbol=AAPL&second_symbol=MSFT",
        )
        .await;

        assert!(html.contains("Failed to generate the comparison report."));
        assert!(!html.contains("Comparison Report:"));
        assert!(!html.contains("boom"));
    }
}
