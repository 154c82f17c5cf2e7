//! 页面渲染
//!
//! 只负责把编排结果投影为 HTML，不包含业务逻辑

use anyhow::Result;
use minijinja::Environment;
use pulldown_cmark::{html, Event, Options, Parser};
use serde::Serialize;

use crate::models::{ComparisonOutcome, TickerQuery, TickerRecord};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

/// 首页渲染数据
#[derive(Debug, Default, Serialize)]
pub struct IndexPage {
    pub first_symbol: String,
    pub second_symbol: String,
    pub search: String,
    /// 目录是否可用，不可用时展示空表提示
    pub directory_available: bool,
    pub directory: Vec<TickerRecord>,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub report_title: Option<String>,
    pub report_html: Option<String>,
}

impl IndexPage {
    pub fn new(
        query: &TickerQuery,
        search: &str,
        directory: Option<Vec<TickerRecord>>,
        outcome: &ComparisonOutcome,
    ) -> Self {
        let mut page = Self {
            first_symbol: query.first_symbol.clone().unwrap_or_default(),
            second_symbol: query.second_symbol.clone().unwrap_or_default(),
            search: search.to_string(),
            directory_available: directory.is_some(),
            directory: directory.unwrap_or_default(),
            ..Default::default()
        };

        match outcome {
            ComparisonOutcome::Idle => {}
            ComparisonOutcome::Incomplete { warning } => page.warning = Some(warning.clone()),
            ComparisonOutcome::Completed(report) => {
                page.report_title = Some(report.title.clone());
                page.report_html = Some(markdown_to_html(&report.content));
            }
            ComparisonOutcome::Failed { message } => page.error = Some(message.clone()),
        }

        page
    }

    pub fn render(&self) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;
        let template = env.get_template("index.html")?;
        Ok(template.render(self)?)
    }
}

/// Markdown 转 HTML，启用表格
///
/// 报告内容来自模型输出，其中的原始 HTML 按文本转义后输出
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}
