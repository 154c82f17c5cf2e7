//! 行情数据服务
//!
//! 对接 Yahoo Finance quoteSummary 接口，为分析模型提供只读的
//! 最新价格、分析师评级与基本面数据

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::config::MarketConfig;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 暴露给模型的行情工具
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketTool {
    CurrentPrice,
    AnalystRecommendations,
    Fundamentals,
}

impl MarketTool {
    pub const ALL: [MarketTool; 3] = [
        MarketTool::CurrentPrice,
        MarketTool::AnalystRecommendations,
        MarketTool::Fundamentals,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarketTool::CurrentPrice => "get_current_stock_price",
            MarketTool::AnalystRecommendations => "get_analyst_recommendations",
            MarketTool::Fundamentals => "get_stock_fundamentals",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MarketTool::CurrentPrice => "Get the current stock price, currency and daily change for a given stock symbol.",
            MarketTool::AnalystRecommendations => "Get analyst recommendation trends and price targets for a given stock symbol.",
            MarketTool::Fundamentals => "Get fundamental data (sector, valuation, profitability and balance sheet ratios) for a given stock symbol.",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// quoteSummary 所需模块
    fn modules(&self) -> &'static [&'static str] {
        match self {
            MarketTool::CurrentPrice => &["price"],
            MarketTool::AnalystRecommendations => &["recommendationTrend", "financialData"],
            MarketTool::Fundamentals => &[
                "summaryProfile",
                "summaryDetail",
                "defaultKeyStatistics",
                "financialData",
                "price",
            ],
        }
    }
}

/// 行情数据能力
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn lookup(&self, tool: MarketTool, symbol: &str) -> Result<Value>;
}

/// Yahoo Finance 行情服务
///
/// 首次请求时完成 cookie 与 crumb 握手，crumb 失效（401）后下次请求重新获取
pub struct MarketDataService {
    client: Client,
    api_base: Url,
    cookie_url: String,
    crumb: Mutex<Option<String>>,
}

impl MarketDataService {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(BROWSER_UA)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: Url::parse(&config.api_base)?,
            cookie_url: config.cookie_url.clone(),
            crumb: Mutex::new(None),
        })
    }

    async fn crumb(&self) -> Result<String> {
        let mut guard = self.crumb.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // 该地址通常返回 404，只用于写入 cookie
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            log::warn!("Yahoo cookie 握手失败: {}", e);
        }

        let url = self.api_base.join("/v1/test/getcrumb")?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("获取 crumb 失败: {}", response.status()));
        }

        let crumb = response.text().await?.trim().to_string();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(anyhow!("crumb 响应无效"));
        }

        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn quote_summary(&self, symbol: &str, modules: &[&str]) -> Result<Value> {
        let crumb = self.crumb().await?;

        let mut url = self.api_base.join("/v10/finance/quoteSummary/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("行情接口地址无效"))?
            .pop_if_empty()
            .push(symbol);

        log::debug!("📡 请求 quoteSummary: {} modules={:?}", symbol, modules);

        let response = self
            .client
            .get(url)
            .query(&[("modules", modules.join(",")), ("crumb", crumb)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            *self.crumb.lock().await = None;
            return Err(anyhow!("Yahoo 鉴权失效，请重试"));
        }

        let body: Value = response.json().await?;
        extract_summary(&body, symbol).map_err(|e| {
            if status.is_success() {
                e
            } else {
                anyhow!("{} (HTTP {})", e, status)
            }
        })
    }
}

#[async_trait]
impl MarketData for MarketDataService {
    async fn lookup(&self, tool: MarketTool, symbol: &str) -> Result<Value> {
        let summary = self.quote_summary(symbol, tool.modules()).await?;
        Ok(match tool {
            MarketTool::CurrentPrice => price_view(symbol, &summary),
            MarketTool::AnalystRecommendations => recommendations_view(symbol, &summary),
            MarketTool::Fundamentals => fundamentals_view(symbol, &summary),
        })
    }
}

/// 取出 quoteSummary.result[0]
fn extract_summary(body: &Value, symbol: &str) -> Result<Value> {
    let summary = &body["quoteSummary"];
    if let Some(description) = summary["error"]["description"].as_str() {
        return Err(anyhow!("{}: {}", symbol, description));
    }
    summary["result"]
        .get(0)
        .cloned()
        .ok_or_else(|| anyhow!("未找到 {} 的行情数据", symbol))
}

/// 读取 `{ raw, fmt }` 结构中的原始值，普通值原样返回
fn field(summary: &Value, module: &str, name: &str) -> Value {
    let value = &summary[module][name];
    match value.get("raw") {
        Some(raw) => raw.clone(),
        None if value.is_object() => Value::Null,
        None => value.clone(),
    }
}

fn price_view(symbol: &str, summary: &Value) -> Value {
    json!({
        "symbol": symbol,
        "name": first_present(&[
            field(summary, "price", "longName"),
            field(summary, "price", "shortName"),
        ]),
        "price": field(summary, "price", "regularMarketPrice"),
        "currency": field(summary, "price", "currency"),
        "change": field(summary, "price", "regularMarketChange"),
        "change_percent": field(summary, "price", "regularMarketChangePercent"),
        "previous_close": field(summary, "price", "regularMarketPreviousClose"),
        "market_state": field(summary, "price", "marketState"),
        "exchange": field(summary, "price", "exchangeName"),
    })
}

fn recommendations_view(symbol: &str, summary: &Value) -> Value {
    let trend: Vec<Value> = summary["recommendationTrend"]["trend"]
        .as_array()
        .map(|periods| {
            periods
                .iter()
                .map(|p| {
                    json!({
                        "period": p["period"],
                        "strong_buy": p["strongBuy"],
                        "buy": p["buy"],
                        "hold": p["hold"],
                        "sell": p["sell"],
                        "strong_sell": p["strongSell"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "symbol": symbol,
        "recommendation": field(summary, "financialData", "recommendationKey"),
        "recommendation_mean": field(summary, "financialData", "recommendationMean"),
        "analyst_count": field(summary, "financialData", "numberOfAnalystOpinions"),
        "target_mean_price": field(summary, "financialData", "targetMeanPrice"),
        "target_high_price": field(summary, "financialData", "targetHighPrice"),
        "target_low_price": field(summary, "financialData", "targetLowPrice"),
        "trend": trend,
    })
}

fn fundamentals_view(symbol: &str, summary: &Value) -> Value {
    json!({
        "symbol": symbol,
        "company_name": first_present(&[
            field(summary, "price", "longName"),
            field(summary, "price", "shortName"),
        ]),
        "sector": field(summary, "summaryProfile", "sector"),
        "industry": field(summary, "summaryProfile", "industry"),
        "market_cap": field(summary, "summaryDetail", "marketCap"),
        "pe_ratio": field(summary, "summaryDetail", "trailingPE"),
        "forward_pe": field(summary, "summaryDetail", "forwardPE"),
        "dividend_yield": field(summary, "summaryDetail", "dividendYield"),
        "beta": field(summary, "summaryDetail", "beta"),
        "52_week_high": field(summary, "summaryDetail", "fiftyTwoWeekHigh"),
        "52_week_low": field(summary, "summaryDetail", "fiftyTwoWeekLow"),
        "eps": field(summary, "defaultKeyStatistics", "trailingEps"),
        "pb_ratio": field(summary, "defaultKeyStatistics", "priceToBook"),
        "total_revenue": field(summary, "financialData", "totalRevenue"),
        "profit_margins": field(summary, "financialData", "profitMargins"),
        "return_on_equity": field(summary, "financialData", "returnOnEquity"),
        "debt_to_equity": field(summary, "financialData", "debtToEquity"),
        "free_cashflow": field(summary, "financialData", "freeCashflow"),
    })
}

fn first_present(values: &[Value]) -> Value {
    values
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Value {
        json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "shortName": "Apple Inc.",
                        "longName": null,
                        "currency": "USD",
                        "regularMarketPrice": {"raw": 227.52, "fmt": "227.52"},
                        "regularMarketChangePercent": {"raw": 0.0123, "fmt": "1.23%"},
                        "regularMarketChange": {},
                        "exchangeName": "NasdaqGS"
                    },
                    "financialData": {
                        "recommendationKey": "buy",
                        "numberOfAnalystOpinions": {"raw": 38, "fmt": "38"},
                        "targetMeanPrice": {"raw": 245.1, "fmt": "245.10"},
                        "profitMargins": {"raw": 0.24, "fmt": "24.00%"}
                    },
                    "recommendationTrend": {
                        "trend": [
                            {"period": "0m", "strongBuy": 11, "buy": 21, "hold": 6, "sell": 0, "strongSell": 0},
                            {"period": "-1m", "strongBuy": 10, "buy": 20, "hold": 7, "sell": 1, "strongSell": 0}
                        ]
                    },
                    "summaryProfile": {"sector": "Technology", "industry": "Consumer Electronics"},
                    "summaryDetail": {"marketCap": {"raw": 3.4e12, "fmt": "3.4T"}, "trailingPE": {"raw": 34.5}}
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_tool_names_round_trip() {
        for tool in MarketTool::ALL {
            assert_eq!(MarketTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(MarketTool::from_name("delete_everything"), None);
    }

    #[test]
    fn test_extract_summary_error() {
        let body = json!({
            "quoteSummary": {"result": null, "error": {"code": "Not Found", "description": "Quote not found for symbol: ZZZZ"}}
        });
        let err = extract_summary(&body, "ZZZZ").unwrap_err();
        assert!(err.to_string().contains("Quote not found"));
    }

    #[test]
    fn test_extract_summary_empty_result() {
        let body = json!({"quoteSummary": {"result": [], "error": null}});
        assert!(extract_summary(&body, "AAPL").is_err());
    }

    #[test]
    fn test_price_view() {
        let summary = extract_summary(&sample_body(), "AAPL").unwrap();
        let view = price_view("AAPL", &summary);

        assert_eq!(view["price"], json!(227.52));
        assert_eq!(view["currency"], json!("USD"));
        // longName 为空时回退到 shortName
        assert_eq!(view["name"], json!("Apple Inc."));
        // 空对象视为缺失
        assert!(view["change"].is_null());
        assert!(view["previous_close"].is_null());
    }

    #[test]
    fn test_recommendations_view() {
        let summary = extract_summary(&sample_body(), "AAPL").unwrap();
        let view = recommendations_view("AAPL", &summary);

        assert_eq!(view["recommendation"], json!("buy"));
        assert_eq!(view["analyst_count"], json!(38));
        assert_eq!(view["trend"].as_array().unwrap().len(), 2);
        assert_eq!(view["trend"][0]["strong_buy"], json!(11));
    }

    #[test]
    fn test_fundamentals_view() {
        let summary = extract_summary(&sample_body(), "AAPL").unwrap();
        let view = fundamentals_view("AAPL", &summary);

        assert_eq!(view["sector"], json!("Technology"));
        assert_eq!(view["market_cap"], json!(3.4e12));
        assert_eq!(view["pe_ratio"], json!(34.5));
        assert_eq!(view["profit_margins"], json!(0.24));
        assert!(view["eps"].is_null());
    }
}
