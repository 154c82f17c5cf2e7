//! 股票目录数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 目录中的一条股票记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerRecord {
    /// 股票代码
    pub symbol: String,
    /// 公司名称
    pub company_name: String,
    /// GICS 行业
    pub sector: String,
}

impl TickerRecord {
    pub fn new(
        symbol: impl Into<String>,
        company_name: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
            sector: sector.into(),
        }
    }

    /// 记录的小写文本形式，每个字段一行
    pub fn search_text(&self) -> String {
        format!("{}\n{}\n{}", self.symbol, self.company_name, self.sector).to_lowercase()
    }
}

/// 目录快照
///
/// 加载后不可变，在缓存有效期内被所有请求共享
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    /// 按源页面顺序排列的记录
    pub records: Vec<TickerRecord>,
    /// 抓取时间
    pub fetched_at: DateTime<Utc>,
}

impl DirectorySnapshot {
    pub fn new(records: Vec<TickerRecord>) -> Self {
        Self {
            records,
            fetched_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 目录查询参数
#[derive(Debug, Default, Deserialize)]
pub struct DirectoryQuery {
    /// 搜索关键字（公司名或代码）
    pub search: Option<String>,
}
