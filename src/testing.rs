//! 测试用的分析服务与目录来源

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{AnalystRequest, AnalystResponse};
use crate::services::analyst::AnalystService;
use crate::services::directory::DirectorySource;

pub const DIRECTORY_HTML: &str = r#"
    <html><body>
    <table class="wikitable sortable" id="constituents">
      <tbody>
        <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th><th>GICS Sub-Industry</th></tr>
        <tr><td><a href="/x">MMM</a></td><td><a href="/3m">3M</a></td><td>Industrials</td><td>Industrial Conglomerates</td></tr>
        <tr><td><a href="/x">AAPL</a></td><td>Apple Inc.<sup>[4]</sup></td><td>Information Technology</td><td>Technology Hardware</td></tr>
        <tr><td>MSFT</td><td>Microsoft</td><td>Information&nbsp;Technology</td><td>Systems Software</td></tr>
      </tbody>
    </table>
    <table class="wikitable" id="changes">
      <tr><th>Date</th><th>Added</th></tr>
    </table>
    </body></html>
"#;

/// 记录调用并返回预设结果的分析服务
pub struct FakeAnalyst {
    reply: Result<String, String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeAnalyst {
    fn build(reply: Result<String, String>, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(content: &str) -> Arc<Self> {
        Self::build(Ok(content.to_string()), None)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::build(Err(message.to_string()), None)
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(Ok("late".to_string()), Some(delay))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalystService for FakeAnalyst {
    async fn run(&self, request: &AnalystRequest) -> Result<AnalystResponse, AppError> {
        self.calls.lock().unwrap().push(request.instruction.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(content) => Ok(AnalystResponse {
                content: content.clone(),
                ..Default::default()
            }),
            Err(message) => Err(AppError::ServiceFailure(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// 固定页面或固定失败的目录来源
pub struct StaticSource {
    html: Option<String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl StaticSource {
    fn build(html: Option<&str>, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            html: html.map(str::to_string),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok(html: &str) -> Arc<Self> {
        Self::build(Some(html), None)
    }

    pub fn ok_after(html: &str, delay: Duration) -> Arc<Self> {
        Self::build(Some(html), Some(delay))
    }

    pub fn failing() -> Arc<Self> {
        Self::build(None, None)
    }

    pub fn failing_after(delay: Duration) -> Arc<Self> {
        Self::build(None, Some(delay))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectorySource for StaticSource {
    async fn fetch_html(&self) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.html.clone().ok_or_else(|| anyhow!("connection refused"))
    }
}
