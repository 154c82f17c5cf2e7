//! 股票目录服务
//!
//! 从维基百科 S&P 500 成分股页面抓取代码、公司名与行业，
//! 结果按配置的有效期缓存，仅用于页面上的辅助搜索

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::Mutex;
use url::Url;

use crate::config::DirectoryConfig;
use crate::error::AppError;
use crate::models::{DirectorySnapshot, TickerRecord};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 抓取失败后的默认退避时间
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(60);

/// 候选表格，按优先级排列
const TABLE_SELECTORS: [&str; 2] = ["table#constituents", "table.wikitable"];

const SYMBOL_COLUMN: &str = "Symbol";
const NAME_COLUMN: &str = "Security";
const SECTOR_COLUMN: &str = "GICS Sector";

/// 目录页面来源
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// 获取原始 HTML
    async fn fetch_html(&self) -> Result<String>;
}

/// 维基百科页面来源
pub struct WikipediaSource {
    client: Client,
    url: Url,
}

impl WikipediaSource {
    pub fn new(config: &DirectoryConfig) -> Result<Self> {
        let url = Url::parse(&config.source_url)?;
        let client = Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl DirectorySource for WikipediaSource {
    async fn fetch_html(&self) -> Result<String> {
        log::info!("📡 请求股票目录 URL: {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("获取股票目录失败: {}", response.status()));
        }

        Ok(response.text().await?)
    }
}

struct CachedSnapshot {
    snapshot: Arc<DirectorySnapshot>,
    loaded_at: Instant,
}

struct CachedFailure {
    reason: String,
    failed_at: Instant,
}

#[derive(Default)]
struct CacheState {
    snapshot: Option<CachedSnapshot>,
    failure: Option<CachedFailure>,
}

/// 目录加载器
///
/// 首次访问时抓取，之后在有效期内复用同一份快照。
/// 抓取期间持有锁，并发的首次访问只会触发一次请求；
/// 抓取失败后在退避时间内直接返回不可用，不再排队重试。
pub struct DirectoryLoader {
    source: Arc<dyn DirectorySource>,
    /// None 表示进程生命周期内不过期
    ttl: Option<Duration>,
    failure_backoff: Duration,
    cache: Mutex<CacheState>,
}

impl DirectoryLoader {
    pub fn new(source: Arc<dyn DirectorySource>, ttl: Option<Duration>) -> Self {
        Self {
            source,
            ttl,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            cache: Mutex::new(CacheState::default()),
        }
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// 按配置创建维基百科目录加载器
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let ttl = match config.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(Self::new(Arc::new(WikipediaSource::new(config)?), ttl)
            .with_failure_backoff(Duration::from_secs(config.failure_backoff_secs)))
    }

    /// 获取目录快照
    ///
    /// 成功结果按有效期缓存；失败只在退避时间内记住，之后重新抓取
    pub async fn load_directory(&self) -> Result<Arc<DirectorySnapshot>, AppError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.snapshot.as_ref() {
            if self.is_fresh(cached) {
                return Ok(cached.snapshot.clone());
            }
            log::info!("股票目录缓存已过期，重新获取");
        }

        if let Some(failure) = cache.failure.as_ref() {
            if failure.failed_at.elapsed() < self.failure_backoff {
                return Err(AppError::data_unavailable(&failure.reason));
            }
        }

        match self.fetch().await {
            Ok(snapshot) => {
                log::info!("股票目录加载完成，共 {} 条记录", snapshot.len());
                cache.snapshot = Some(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    loaded_at: Instant::now(),
                });
                cache.failure = None;
                Ok(snapshot)
            }
            Err(e) => {
                log::warn!("股票目录获取失败，{}s 内不再重试: {}", self.failure_backoff.as_secs(), e);
                let reason = e.to_string();
                cache.failure = Some(CachedFailure {
                    reason: reason.clone(),
                    failed_at: Instant::now(),
                });
                Err(AppError::data_unavailable(reason))
            }
        }
    }

    async fn fetch(&self) -> Result<Arc<DirectorySnapshot>> {
        let html = self.source.fetch_html().await?;
        let records = parse_directory(&html)?;
        Ok(Arc::new(DirectorySnapshot::new(records)))
    }

    fn is_fresh(&self, cached: &CachedSnapshot) -> bool {
        match self.ttl {
            Some(ttl) => cached.loaded_at.elapsed() < ttl,
            None => true,
        }
    }
}

/// 按关键字过滤目录
///
/// 不区分大小写地匹配记录的全部字段；关键字为空时原样返回
pub fn filter(query: &str, snapshot: &DirectorySnapshot) -> DirectorySnapshot {
    if query.is_empty() {
        return snapshot.clone();
    }

    let needle = query.to_lowercase();
    DirectorySnapshot {
        records: snapshot
            .records
            .iter()
            .filter(|record| record.search_text().contains(&needle))
            .cloned()
            .collect(),
        fetched_at: snapshot.fetched_at,
    }
}

/// 解析成分股表格
///
/// 按表头名称定位列，没有符合要求的表格或表格为空时返回错误
pub fn parse_directory(html: &str) -> Result<Vec<TickerRecord>> {
    let document = Html::parse_document(html);
    let row_selector = parse_selector("tr")?;
    let cell_selector = parse_selector("th, td")?;
    let footnote = Regex::new(r"\[[^\]]*\]")?;

    for css in TABLE_SELECTORS {
        let table_selector = parse_selector(css)?;

        for table in document.select(&table_selector) {
            let mut rows = table.select(&row_selector);
            let header: Vec<String> = match rows.next() {
                Some(row) => row_cells(row, &cell_selector, &footnote),
                None => continue,
            };

            let column = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
            let (Some(symbol_idx), Some(name_idx), Some(sector_idx)) =
                (column(SYMBOL_COLUMN), column(NAME_COLUMN), column(SECTOR_COLUMN))
            else {
                continue;
            };

            let records: Vec<TickerRecord> = rows
                .map(|row| row_cells(row, &cell_selector, &footnote))
                .filter_map(|cells| {
                    let symbol = cells.get(symbol_idx)?;
                    if symbol.is_empty() {
                        return None;
                    }
                    Some(TickerRecord::new(
                        symbol.clone(),
                        cells.get(name_idx)?.clone(),
                        cells.get(sector_idx)?.clone(),
                    ))
                })
                .collect();

            if records.is_empty() {
                return Err(anyhow!("成分股表格为空"));
            }
            return Ok(records);
        }
    }

    Err(anyhow!("未找到包含 Symbol/Security/GICS Sector 列的表格"))
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("选择器 {} 无效: {:?}", css, e))
}

fn row_cells(row: ElementRef<'_>, cell_selector: &Selector, footnote: &Regex) -> Vec<String> {
    row.select(cell_selector)
        .map(|cell| {
            let text = cell.text().collect::<Vec<_>>().join("").replace('\u{a0}', " ");
            footnote.replace_all(&text, "").trim().to_string()
        })
        .collect()
}
